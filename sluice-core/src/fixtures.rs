//! Minimal isolatable channel shared by the unit tests

use crate::channel::{NarrowableSource, Scoped, ScopedChannel};
use crate::stream::Stream;
use sluice_types::ScopePath;

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub scope: ScopePath,
    pub text: String,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            scope: ScopePath::root(),
            text: text.into(),
        }
    }

    pub fn at<const N: usize>(segments: [&str; N], text: impl Into<String>) -> Self {
        Self {
            scope: ScopePath::from_segments(segments),
            text: text.into(),
        }
    }
}

impl Scoped for Note {
    fn tag(mut self, path: &ScopePath) -> Self {
        self.scope = path.join(&self.scope);
        self
    }

    fn untag(mut self) -> Self {
        self.scope = ScopePath::root();
        self
    }

    fn scope(&self) -> &ScopePath {
        &self.scope
    }
}

/// Sees only the notes posted exactly at its own scope
#[derive(Debug, Clone)]
pub struct NoteSource {
    notes: Stream<Note>,
    scope: ScopePath,
}

impl NoteSource {
    pub fn new(notes: Stream<Note>) -> Self {
        Self {
            notes,
            scope: ScopePath::root(),
        }
    }

    pub fn notes(&self) -> Stream<Note> {
        let scope = self.scope.clone();
        self.notes.filter(move |note| note.scope == scope)
    }
}

impl NarrowableSource for NoteSource {
    fn narrow(&self, path: &ScopePath) -> Self {
        Self {
            notes: self.notes.clone(),
            scope: self.scope.join(path),
        }
    }

    fn scope(&self) -> &ScopePath {
        &self.scope
    }
}

pub type NoteChannel = ScopedChannel<NoteSource, Note>;
