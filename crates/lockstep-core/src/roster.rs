//! Participant roster with seat assignment and delivery cursors.
//!
//! The roster maps owner id → participant. Each participant carries a
//! delivery cursor: the id of the last frame it was sent. A joining
//! participant's cursor starts at the newest sealed frame, so it never
//! receives history from before it joined.
//!
//! Iteration order is unspecified. Delivery to each participant is
//! independent, so nothing relies on it.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use lockstep_proto::FrameId;

/// Join-order rank of a participant (1-based).
///
/// Used for display and player ordering, never for delivery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seat(u32);

impl Seat {
    /// Wrap a raw seat number.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw seat number.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A connected participant.
#[derive(Debug, Clone)]
pub struct Participant<C> {
    /// Identity of the participant
    pub owner_id: u64,
    /// Seat assigned at join time
    pub seat: Seat,
    /// Last frame this participant has been sent
    cursor: FrameId,
    /// Outbound connection handle
    pub connection: C,
}

impl<C> Participant<C> {
    /// Last frame this participant has been sent.
    pub fn cursor(&self) -> FrameId {
        self.cursor
    }

    /// Move the cursor forward.
    ///
    /// # Invariants
    ///
    /// - Pre: `to >= self.cursor` (cursors never move backwards)
    pub(crate) fn advance_to(&mut self, to: FrameId) {
        debug_assert!(to >= self.cursor, "cursor regressed: {} -> {}", self.cursor, to);
        self.cursor = self.cursor.max(to);
    }
}

/// Connected participants keyed by owner id.
#[derive(Debug)]
pub struct Roster<C> {
    participants: HashMap<u64, Participant<C>>,
}

impl<C> Default for Roster<C> {
    fn default() -> Self {
        Self { participants: HashMap::new() }
    }
}

impl<C> Roster<C> {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant and return its seat.
    ///
    /// The cursor starts at `latest`, the newest sealed frame at join time,
    /// so the participant only receives frames sealed from now on.
    ///
    /// A new seat is `len() + 1`, bumped past any seat a connected
    /// participant already holds. If `owner_id` is already connected, its
    /// connection is replaced, its cursor is rebased to `latest` and it keeps
    /// its seat.
    pub fn join(&mut self, owner_id: u64, connection: C, latest: FrameId) -> Seat {
        if let Some(existing) = self.participants.get_mut(&owner_id) {
            existing.connection = connection;
            existing.cursor = latest;
            return existing.seat;
        }

        let seat = self.next_seat();
        self.participants.insert(owner_id, Participant { owner_id, seat, cursor: latest, connection });

        debug_assert_eq!(self.seats_in_use().len(), self.participants.len());

        seat
    }

    /// Remove a participant. Returns it if it was present.
    ///
    /// Other participants keep their seats; gaps are expected.
    pub fn leave(&mut self, owner_id: u64) -> Option<Participant<C>> {
        self.participants.remove(&owner_id)
    }

    /// Participant by owner id.
    pub fn get(&self, owner_id: u64) -> Option<&Participant<C>> {
        self.participants.get(&owner_id)
    }

    /// Whether `owner_id` is connected.
    pub fn contains(&self, owner_id: u64) -> bool {
        self.participants.contains_key(&owner_id)
    }

    /// Number of connected participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Apply `f` to every participant, in unspecified order.
    pub fn for_each(&self, mut f: impl FnMut(&Participant<C>)) {
        for participant in self.participants.values() {
            f(participant);
        }
    }

    /// All participants, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant<C>> + '_ {
        self.participants.values()
    }

    /// All participants mutably, in unspecified order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Participant<C>> + '_ {
        self.participants.values_mut()
    }

    /// Lowest cursor across participants. `None` if nobody is connected.
    pub fn min_cursor(&self) -> Option<FrameId> {
        self.participants.values().map(Participant::cursor).min()
    }

    fn seats_in_use(&self) -> HashSet<Seat> {
        self.participants.values().map(|p| p.seat).collect()
    }

    fn next_seat(&self) -> Seat {
        let taken = self.seats_in_use();
        let mut candidate = self.participants.len() as u32 + 1;

        while taken.contains(&Seat(candidate)) {
            candidate += 1;
        }

        Seat(candidate)
    }
}
