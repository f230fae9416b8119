//! Playback state for one listening session.

use crate::library::Track;
use crate::recommend::{PlayHistory, find_next};

/// What is playing, what played recently, and whether playback can resume.
///
/// A session is playing, paused (resumable) or stopped. Only a paused session
/// can resume.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSession {
    current: Option<Track>,
    history: PlayHistory,
    playing: bool,
    can_resume: bool,
}

impl PlaybackSession {
    pub fn new(history: PlayHistory) -> Self {
        Self {
            current: None,
            history,
            playing: false,
            can_resume: false,
        }
    }

    /// Start playing `track` and record it in the history.
    pub fn play(&mut self, track: Track) {
        tracing::debug!(track = %track.id, "Playing");
        self.history.record(track.id.clone());
        self.current = Some(track);
        self.playing = true;
        self.can_resume = false;
    }

    /// Recommend the track to follow the current one, without starting it.
    pub fn next<'a>(&self, candidates: &'a [Track]) -> Option<&'a Track> {
        let current = self.current.as_ref()?;
        find_next(current, candidates, &self.history.snapshot())
    }

    /// Pick and start the next track. Returns the track now playing.
    pub fn advance(&mut self, candidates: &[Track]) -> Option<&Track> {
        let next = self.next(candidates)?.clone();
        self.play(next);
        self.current.as_ref()
    }

    /// Pause playback. Does nothing unless a track is playing.
    pub fn pause(&mut self) {
        if self.playing {
            self.playing = false;
            self.can_resume = true;
        }
    }

    /// Resume a paused track. Returns `false` when there is nothing to resume.
    pub fn resume(&mut self) -> bool {
        if !self.can_resume || self.current.is_none() {
            return false;
        }
        self.playing = true;
        self.can_resume = false;
        true
    }

    /// Stop playback; the current track is kept but cannot be resumed.
    pub fn stop(&mut self) {
        self.playing = false;
        self.can_resume = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn can_resume(&self) -> bool {
        self.can_resume
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &PlayHistory {
        &self.history
    }

    pub fn into_history(self) -> PlayHistory {
        self.history
    }
}
