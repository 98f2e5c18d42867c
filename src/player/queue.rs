use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{
    common::{errors::PlayerError, types::TrackId},
    protocol::models::{RepeatMode, Track},
};

/// Ordered track list plus the playback cursor.
///
/// Owned by exactly one [`Player`](super::Player); everything outside it
/// only ever sees clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    pub tracks: Vec<Track>,
    pub current_index: usize,
    pub is_playing: bool,
    pub is_paused: bool,
    pub volume: u8,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
    /// Whole seconds into the current track.
    pub position: u64,
}

impl Default for QueueState {
    fn default() -> Self {
        Self::new(100)
    }
}

impl QueueState {
    pub fn new(volume: u8) -> Self {
        Self {
            tracks: Vec::new(),
            current_index: 0,
            is_playing: false,
            is_paused: false,
            volume: volume.min(100),
            repeat_mode: RepeatMode::Off,
            shuffle: false,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub fn has_next(&self) -> bool {
        self.current_index + 1 < self.tracks.len()
    }

    pub fn index_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    pub fn append(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Removes a track. Refuses to pull the current track out from under an
    /// active stream.
    pub fn remove_by_id(&mut self, id: &TrackId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if index == self.current_index && self.is_playing {
            return false;
        }

        self.tracks.remove(index);
        if index < self.current_index {
            self.current_index -= 1;
        }
        self.clamp_cursor();
        true
    }

    /// Moves the track at `from` to `to` with splice semantics. The cursor
    /// follows whichever track it pointed at before the move.
    pub fn move_track(&mut self, from: usize, to: usize) -> Result<(), PlayerError> {
        let len = self.tracks.len();
        if from >= len || to >= len {
            return Err(PlayerError::InvalidRange(format!(
                "move {from} -> {to} in a queue of {len}"
            )));
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        let cur = self.current_index;
        if from == cur {
            self.current_index = to;
        } else if from < cur && to >= cur {
            self.current_index -= 1;
        } else if from > cur && to <= cur {
            self.current_index += 1;
        }
        Ok(())
    }

    /// Shuffles every track except the current one, which becomes index 0.
    /// Returns false for queues too short to shuffle.
    pub fn shuffle_remaining<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.tracks.len() <= 1 {
            return false;
        }

        let current = self.tracks.remove(self.current_index);
        self.tracks.shuffle(rng);
        self.tracks.insert(0, current);
        self.current_index = 0;
        true
    }

    fn clamp_cursor(&mut self) {
        if self.tracks.is_empty() {
            self.current_index = 0;
        } else if self.current_index >= self.tracks.len() {
            self.current_index = self.tracks.len() - 1;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::models::TrackSource;

    pub(crate) fn track(title: &str, duration: u64) -> Track {
        Track {
            id: TrackId::from(title),
            title: title.to_owned(),
            artist: "artist".to_owned(),
            duration,
            thumbnail: String::new(),
            url: format!("https://www.youtube.com/watch?v={title}"),
            source: TrackSource::Youtube,
            requested_by: "tester".to_owned(),
            requested_at: 0,
        }
    }

    fn queue(titles: &[&str]) -> QueueState {
        let mut q = QueueState::default();
        for t in titles {
            q.append(track(t, 180));
        }
        q
    }

    fn titles(q: &QueueState) -> Vec<&str> {
        q.tracks.iter().map(|t| t.title.as_str()).collect()
    }

    fn cursor_in_bounds(q: &QueueState) -> bool {
        q.tracks.is_empty() || q.current_index < q.tracks.len()
    }

    #[test]
    fn remove_current_while_playing_is_refused() {
        let mut q = queue(&["A", "B"]);
        q.is_playing = true;
        let before = q.clone();
        assert!(!q.remove_by_id(&TrackId::from("A")));
        assert_eq!(q, before);
    }

    #[test]
    fn remove_before_cursor_shifts_it_back() {
        let mut q = queue(&["A", "B", "C"]);
        q.current_index = 2;
        q.is_playing = true;
        assert!(q.remove_by_id(&TrackId::from("A")));
        assert_eq!(q.current_index, 1);
        assert_eq!(q.current().map(|t| t.title.as_str()), Some("C"));
    }

    #[test]
    fn remove_last_track_when_idle_clamps_cursor() {
        let mut q = queue(&["A", "B"]);
        q.current_index = 1;
        assert!(q.remove_by_id(&TrackId::from("B")));
        assert_eq!(q.current_index, 0);
        assert!(q.remove_by_id(&TrackId::from("A")));
        assert_eq!(q.current_index, 0);
        assert!(q.is_empty());
        assert!(!q.remove_by_id(&TrackId::from("A")));
    }

    #[test]
    fn move_current_to_end_follows_the_track() {
        let mut q = queue(&["A", "B", "C"]);
        q.move_track(0, 2).unwrap();
        assert_eq!(titles(&q), ["B", "C", "A"]);
        assert_eq!(q.current_index, 2);
    }

    #[test]
    fn move_across_cursor_keeps_identity() {
        let mut q = queue(&["A", "B", "C", "D"]);
        q.current_index = 1;

        q.move_track(3, 0).unwrap();
        assert_eq!(q.current().unwrap().title, "B");

        q.move_track(0, 3).unwrap();
        assert_eq!(q.current().unwrap().title, "B");

        q.move_track(2, 3).unwrap();
        assert_eq!(q.current().unwrap().title, "B");
        assert!(cursor_in_bounds(&q));
    }

    #[test]
    fn move_out_of_range_is_rejected() {
        let mut q = queue(&["A", "B"]);
        assert!(matches!(q.move_track(0, 2), Err(PlayerError::InvalidRange(_))));
        assert!(matches!(q.move_track(5, 0), Err(PlayerError::InvalidRange(_))));
        assert_eq!(titles(&q), ["A", "B"]);
    }

    #[test]
    fn shuffle_puts_current_track_first() {
        let mut rng = rand::thread_rng();
        for _ in 0..32 {
            let mut q = queue(&["A", "B", "C", "D", "E"]);
            q.current_index = 3;
            assert!(q.shuffle_remaining(&mut rng));
            assert_eq!(q.current_index, 0);
            assert_eq!(q.tracks[0].title, "D");
            let mut sorted = titles(&q);
            sorted.sort();
            assert_eq!(sorted, ["A", "B", "C", "D", "E"]);
        }
    }

    #[test]
    fn shuffle_of_single_track_is_a_no_op() {
        let mut q = queue(&["A"]);
        assert!(!q.shuffle_remaining(&mut rand::thread_rng()));
    }

    #[test]
    fn cursor_stays_in_bounds_through_mixed_mutations() {
        let mut rng = rand::thread_rng();
        let mut q = queue(&["A", "B", "C", "D", "E", "F"]);
        for step in 0..200usize {
            let len = q.len().max(1);
            match step % 4 {
                0 => q.append(track(&format!("T{step}"), 60)),
                1 => {
                    let id = q.tracks[step % q.len()].id.clone();
                    q.is_playing = step % 3 == 0;
                    q.remove_by_id(&id);
                }
                2 => {
                    let _ = q.move_track(step % len, (step * 7) % len);
                }
                _ => {
                    q.shuffle_remaining(&mut rng);
                }
            }
            assert!(cursor_in_bounds(&q), "step {step}");
        }
    }
}
