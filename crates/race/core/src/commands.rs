//! Operator commands on the roster, place lists and bunch times.
//!
//! Every command validates its whole input before touching the state, so a
//! rejected command leaves the event exactly as it was.
use std::fmt;

use tracing::{debug, info, warn};

use crate::error::CommandError;
use crate::passing::{PassingOutcome, RiderDirectory};
use crate::places::PlaceList;
use crate::rider::{Bib, DnfCode, Rider};
use crate::state::RaceState;
use crate::tod::Tod;

/// Rider command parsed from an operator action code and bib list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RiderCommand {
    Add(Vec<Bib>),
    Delete(Vec<Bib>),
    Retire(DnfCode, Vec<Bib>),
    Return(Vec<Bib>),
    Manual(Vec<Bib>),
    Query(Vec<Bib>),
    Comment(String),
    Finish(String),
    Intermediate { code: String, places: String },
}

fn bib_list(text: &str) -> Vec<Bib> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(Bib::new)
        .collect()
}

impl RiderCommand {
    /// Parses `code` with its argument text.
    ///
    /// Codes that are not rider actions are taken as intermediate codes; the
    /// state decides later whether such an intermediate exists.
    pub fn parse(code: &str, args: &str) -> Result<Self, CommandError> {
        let code = code.trim().to_lowercase();
        let command = match code.as_str() {
            "" => return Err(CommandError::UnknownCommand(code)),
            "add" => Self::Add(bib_list(args)),
            "del" => Self::Delete(bib_list(args)),
            "ret" => Self::Return(bib_list(args)),
            "man" => Self::Manual(bib_list(args)),
            "que" => Self::Query(bib_list(args)),
            "com" => Self::Comment(args.trim().to_owned()),
            "fin" => Self::Finish(args.to_owned()),
            other => match other.parse::<DnfCode>() {
                Ok(dnf) => Self::Retire(dnf, bib_list(args)),
                Err(_) => Self::Intermediate {
                    code: other.to_owned(),
                    places: args.to_owned(),
                },
            },
        };
        Ok(command)
    }
}

/// Query summary for one rider.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiderSummary {
    pub bib: Bib,
    pub name: String,
    pub categories: Vec<String>,
    pub in_race: bool,
    pub comment: Option<DnfCode>,
    pub place: Option<u32>,
    pub laps: u32,
    pub bunch: Option<Tod>,
    pub passings: usize,
    pub last_passing: Option<Tod>,
}

impl RiderSummary {
    fn of(rider: &Rider) -> Self {
        Self {
            bib: rider.bib.clone(),
            name: rider.name.clone(),
            categories: rider.categories.clone(),
            in_race: rider.in_race,
            comment: rider.comment,
            place: rider.place,
            laps: rider.laps,
            bunch: rider.bunch(),
            passings: rider.seen().len(),
            last_passing: rider.last_passing(),
        }
    }
}

impl fmt::Display for RiderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.bib, self.name, self.categories.join(" "))?;
        if let Some(bunch) = self.bunch {
            write!(f, " {}", bunch.rawtime(0))?;
        }
        if let Some(code) = self.comment {
            write!(f, " {code}")?;
        }
        if let Some(place) = self.place {
            write!(f, " {place}.")?;
        }
        write!(f, " laps={}", self.laps)?;
        if let Some(last) = self.last_passing {
            write!(f, " last={}", last.rawtime(1))?;
        }
        Ok(())
    }
}

/// What a command did.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandOutcome {
    /// Riders whose state changed.
    Updated(Vec<Bib>),
    Summary(Vec<RiderSummary>),
    Passings(Vec<PassingOutcome>),
    /// Normalised place list now in force.
    Places(String),
    Noted,
}

impl RaceState {
    fn ensure_writable(&self) -> Result<(), CommandError> {
        if self.read_only {
            return Err(CommandError::ReadOnly);
        }
        Ok(())
    }

    fn ensure_registered(&self, bibs: &[Bib]) -> Result<(), CommandError> {
        match bibs.iter().find(|b| !self.riders.contains(b)) {
            Some(bib) => Err(CommandError::UnknownRider(bib.clone())),
            None => Ok(()),
        }
    }

    /// Applies a rider command.
    ///
    /// `now` stamps manual passings; `directory` supplies names and
    /// categories for added riders.
    pub fn apply_command<D>(
        &mut self,
        directory: &D,
        command: RiderCommand,
        now: Tod,
    ) -> Result<CommandOutcome, CommandError>
    where
        D: RiderDirectory + ?Sized,
    {
        if !matches!(command, RiderCommand::Query(_)) {
            self.ensure_writable()?;
        }
        match command {
            RiderCommand::Add(bibs) => self.add_riders(directory, &bibs).map(CommandOutcome::Updated),
            RiderCommand::Delete(bibs) => self.remove_riders(&bibs).map(CommandOutcome::Updated),
            RiderCommand::Retire(code, bibs) => {
                self.retire_riders(code, &bibs).map(CommandOutcome::Updated)
            }
            RiderCommand::Return(bibs) => self.return_riders(&bibs).map(CommandOutcome::Updated),
            RiderCommand::Manual(bibs) => Ok(CommandOutcome::Passings(
                bibs.iter()
                    .map(|bib| self.submit_manual_passing(directory, bib, now))
                    .collect(),
            )),
            RiderCommand::Query(bibs) => Ok(CommandOutcome::Summary(self.query_riders(&bibs))),
            RiderCommand::Comment(text) => {
                self.add_comment(text);
                Ok(CommandOutcome::Noted)
            }
            RiderCommand::Finish(text) => self.set_places(&text).map(CommandOutcome::Places),
            RiderCommand::Intermediate { code, places } => self
                .set_intermediate_places(&code, &places)
                .map(CommandOutcome::Places),
        }
    }

    /// Registers riders, taking details from the directory when listed there.
    /// Already registered bibs are skipped.
    pub fn add_riders<D>(&mut self, directory: &D, bibs: &[Bib]) -> Result<Vec<Bib>, CommandError>
    where
        D: RiderDirectory + ?Sized,
    {
        self.ensure_writable()?;
        let mut added = Vec::new();
        for bib in bibs.iter().filter(|b| !b.is_placeholder()) {
            let rider = directory
                .lookup(bib.as_str(), &self.config.series)
                .map(|entry| entry.to_rider())
                .unwrap_or_else(|| Rider::new(bib.clone()));
            if self.riders.add(rider) {
                info!(target: "race::command", %bib, "rider added");
                added.push(bib.clone());
            } else {
                debug!(target: "race::command", %bib, "rider already registered");
            }
        }
        if !added.is_empty() {
            self.dirty = true;
        }
        Ok(added)
    }

    /// Registers one fully specified rider.
    pub fn add_rider(&mut self, rider: Rider) -> Result<(), CommandError> {
        self.ensure_writable()?;
        let bib = rider.bib.clone();
        if !self.riders.add(rider) {
            return Err(CommandError::DuplicateRider(bib));
        }
        self.dirty = true;
        Ok(())
    }

    /// Removes riders from the event and from every place list.
    pub fn remove_riders(&mut self, bibs: &[Bib]) -> Result<Vec<Bib>, CommandError> {
        self.ensure_writable()?;
        self.ensure_registered(bibs)?;
        for bib in bibs {
            self.riders.remove(bib);
            self.places.remove(bib);
            for intermediate in &mut self.intermediates {
                intermediate.places.remove(bib);
            }
            info!(target: "race::command", %bib, "rider removed");
        }
        self.dirty = true;
        Ok(bibs.to_vec())
    }

    /// Marks riders out with `code`.
    pub fn retire_riders(&mut self, code: DnfCode, bibs: &[Bib]) -> Result<Vec<Bib>, CommandError> {
        self.ensure_writable()?;
        self.ensure_registered(bibs)?;
        for bib in bibs {
            if let Some(rider) = self.riders.get_mut(bib) {
                rider.retire(code);
                info!(target: "race::command", %bib, %code, "rider did not finish");
            }
        }
        self.dirty = true;
        Ok(bibs.to_vec())
    }

    /// Returns riders to the race with laps recounted from their passings.
    pub fn return_riders(&mut self, bibs: &[Bib]) -> Result<Vec<Bib>, CommandError> {
        self.ensure_writable()?;
        self.ensure_registered(bibs)?;
        for bib in bibs {
            if let Some(rider) = self.riders.get_mut(bib) {
                rider.reinstate();
                info!(target: "race::command", %bib, laps = rider.laps, "rider returned to event");
            }
        }
        self.dirty = true;
        Ok(bibs.to_vec())
    }

    pub fn query_riders(&self, bibs: &[Bib]) -> Vec<RiderSummary> {
        bibs.iter()
            .filter_map(|bib| {
                let summary = self.riders.get(bib).map(RiderSummary::of);
                if summary.is_none() {
                    info!(target: "race::command", %bib, "query unknown rider");
                }
                summary
            })
            .collect()
    }

    /// Checks a proposed place list against the roster.
    ///
    /// With `finish` set, riders out of the race are refused as well.
    pub fn check_places(&self, places: &PlaceList, finish: bool) -> Result<(), CommandError> {
        if let Some(bib) = places.duplicates().into_iter().next() {
            return Err(CommandError::DuplicatePlace(bib));
        }
        for bib in places.bibs().filter(|b| !b.is_placeholder()) {
            let Some(rider) = self.riders.get(bib) else {
                return Err(CommandError::NonStarter(bib.clone()));
            };
            if !rider.in_race {
                if finish {
                    return Err(CommandError::NotInRace(bib.clone()));
                }
                info!(target: "race::command", %bib, "retired rider in intermediate places");
            }
        }
        Ok(())
    }

    /// Replaces the finish places; returns the normalised text.
    pub fn set_places(&mut self, text: &str) -> Result<String, CommandError> {
        self.ensure_writable()?;
        let places = PlaceList::parse(text);
        self.check_places(&places, true)?;
        let normalised = places.to_string();
        info!(target: "race::command", places = %normalised, "finish places");
        self.places = places;
        self.dirty = true;
        Ok(normalised)
    }

    /// Replaces an intermediate's places; retired riders are allowed.
    pub fn set_intermediate_places(&mut self, code: &str, text: &str) -> Result<String, CommandError> {
        self.ensure_writable()?;
        let code = code.trim().to_lowercase();
        if self.intermediate(&code).is_none() {
            return Err(CommandError::UnknownIntermediate(code));
        }
        let places = PlaceList::parse(text);
        self.check_places(&places, false)?;
        let normalised = places.to_string();
        if let Some(intermediate) = self.intermediates.iter_mut().find(|i| i.code == code) {
            info!(target: "race::command", intermediate = %code, places = %normalised, "intermediate places");
            intermediate.places = places;
        }
        self.dirty = true;
        Ok(normalised)
    }

    /// Takes `bib` out of the finish places.
    pub fn clear_place(&mut self, bib: &Bib) -> Result<(), CommandError> {
        self.ensure_writable()?;
        if !self.places.remove(bib) {
            return Err(CommandError::NotPlaced(bib.clone()));
        }
        info!(target: "race::command", %bib, "cleared from places");
        self.dirty = true;
        Ok(())
    }

    /// Exchanges two riders in the finish places.
    pub fn swap_places(&mut self, first: &Bib, second: &Bib) -> Result<(), CommandError> {
        self.ensure_writable()?;
        for bib in [first, second] {
            if !self.places.contains(bib) {
                return Err(CommandError::NotPlaced(bib.clone()));
            }
        }
        if self.places.swap(first, second) {
            info!(target: "race::command", %first, %second, "swapped places");
            self.dirty = true;
        }
        Ok(())
    }

    /// Edits a rider's manual bunch time.
    ///
    /// Empty text clears the finish crossing and both bunch times. `+MM:SS`
    /// is a down time on the winner, `s` copies the rider ahead in the
    /// current order, anything else is an absolute bunch time.
    pub fn edit_bunch(&mut self, bib: &Bib, text: &str) -> Result<Option<Tod>, CommandError> {
        self.ensure_writable()?;
        let position = self
            .riders
            .position(bib)
            .ok_or_else(|| CommandError::UnknownRider(bib.clone()))?;
        let text = text.trim();

        if text.is_empty() {
            if let Some(rider) = self.riders.get_mut(bib) {
                rider.rftime = None;
                rider.mbunch = None;
                rider.cbunch = None;
            }
            info!(target: "race::command", %bib, "bunch time cleared");
            self.dirty = true;
            return Ok(None);
        }

        let bunch = if text.contains('+') {
            let body = text.replace('+', "");
            let down = Tod::parse(&body).map_err(|err| CommandError::invalid_time(text, err))?;
            Some(self.winner_bunch.unwrap_or(Tod::ZERO) + down)
        } else if text.starts_with('s') {
            let ahead = position
                .checked_sub(1)
                .and_then(|idx| self.riders.as_slice().get(idx))
                .and_then(Rider::bunch);
            if position == 0 {
                info!(target: "race::command", %bib, "same time ignored on first rider");
            }
            ahead
        } else {
            Some(Tod::parse(text).map_err(|err| CommandError::invalid_time(text, err))?)
        };

        if let Some(rider) = self.riders.get_mut(bib)
            && rider.mbunch != bunch
        {
            rider.mbunch = bunch;
            info!(
                target: "race::command",
                %bib,
                bunch = %bunch.map(|b| b.rawtime(0)).unwrap_or_default(),
                "manual bunch time"
            );
            self.dirty = true;
        }
        Ok(bunch)
    }

    /// Sets a rider's lap count, or recounts from passings with `?`.
    pub fn set_laps(&mut self, bib: &Bib, text: &str) -> Result<u32, CommandError> {
        self.ensure_writable()?;
        let text = text.trim();
        let rider = self
            .riders
            .get_mut(bib)
            .ok_or_else(|| CommandError::UnknownRider(bib.clone()))?;
        let laps = if text == "?" {
            rider.seen().len() as u32
        } else {
            text.parse::<u32>()
                .map_err(|_| CommandError::InvalidLaps(text.to_owned()))?
        };
        if rider.laps != laps {
            info!(target: "race::command", %bib, from = rider.laps, to = laps, "lap count edited");
            rider.laps = laps;
            self.dirty = true;
        }
        Ok(laps)
    }

    /// Sets or clears a rider's personal start offset from time text.
    pub fn set_start_offset(&mut self, bib: &Bib, text: &str) -> Result<Option<Tod>, CommandError> {
        self.ensure_writable()?;
        let offset = Tod::parse_opt(text).map_err(|err| CommandError::invalid_time(text, err))?;
        let rider = self
            .riders
            .get_mut(bib)
            .ok_or_else(|| CommandError::UnknownRider(bib.clone()))?;
        rider.start_offset = offset;
        self.dirty = true;
        Ok(offset)
    }

    /// Sets or clears a rider's stage bonus and penalty.
    pub fn set_bonus_penalty(
        &mut self,
        bib: &Bib,
        bonus: Option<Tod>,
        penalty: Option<Tod>,
    ) -> Result<(), CommandError> {
        self.ensure_writable()?;
        let rider = self
            .riders
            .get_mut(bib)
            .ok_or_else(|| CommandError::UnknownRider(bib.clone()))?;
        if bonus.is_some() || penalty.is_some() {
            warn!(target: "race::command", %bib, "manual time adjustment");
        }
        rider.bonus = bonus;
        rider.penalty = penalty;
        self.dirty = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contest::Intermediate;
    use crate::passing::DirectoryEntry;

    fn state_with(bibs: &[&str]) -> RaceState {
        let mut state = RaceState::default();
        for bib in bibs {
            state.add_rider(Rider::new(Bib::new(*bib))).unwrap();
        }
        state
    }

    fn bibs(text: &str) -> Vec<Bib> {
        bib_list(text)
    }

    #[test]
    fn parse_maps_codes_to_commands() {
        assert_eq!(
            RiderCommand::parse("DNF", "1, 2").unwrap(),
            RiderCommand::Retire(DnfCode::Dnf, bibs("1 2"))
        );
        assert_eq!(
            RiderCommand::parse("wd", "7").unwrap(),
            RiderCommand::Retire(DnfCode::Wd, bibs("7"))
        );
        assert!(matches!(
            RiderCommand::parse("s1", "1 2").unwrap(),
            RiderCommand::Intermediate { .. }
        ));
        assert_eq!(
            RiderCommand::parse("", "1").unwrap_err().error_code(),
            "UNKNOWN_COMMAND"
        );
    }

    #[test]
    fn invalid_places_leave_list_unchanged() {
        let mut state = state_with(&["1", "2", "3"]);
        state.set_places("1 2").unwrap();

        let err = state.set_places("1 2 1").unwrap_err();
        assert_eq!(err, CommandError::DuplicatePlace(Bib::new("1")));
        let err = state.set_places("1 9").unwrap_err();
        assert_eq!(err, CommandError::NonStarter(Bib::new("9")));

        state.retire_riders(DnfCode::Dnf, &bibs("3")).unwrap();
        let err = state.set_places("3 1 2").unwrap_err();
        assert_eq!(err.error_code(), "NOT_IN_RACE");
        assert_eq!(state.places().to_string(), "1 2");
    }

    #[test]
    fn placeholder_is_allowed_in_places() {
        let mut state = state_with(&["1", "2"]);
        assert_eq!(state.set_places("1 x 2").unwrap(), "1 x 2");
    }

    #[test]
    fn intermediate_places_allow_retired_riders() {
        let mut state = state_with(&["1", "2"]);
        assert!(state.add_intermediate(Intermediate::new("s1")));
        state.retire_riders(DnfCode::Dnf, &bibs("2")).unwrap();
        assert_eq!(state.set_intermediate_places("S1", "2 1").unwrap(), "2 1");
        assert_eq!(
            state.set_intermediate_places("s2", "1").unwrap_err(),
            CommandError::UnknownIntermediate("s2".into())
        );
    }

    #[test]
    fn retire_validates_every_bib_first() {
        let mut state = state_with(&["1", "2"]);
        let err = state.retire_riders(DnfCode::Dsq, &bibs("1 5")).unwrap_err();
        assert_eq!(err, CommandError::UnknownRider(Bib::new("5")));
        assert!(state.rider(&Bib::new("1")).unwrap().comment.is_none());
    }

    #[test]
    fn withdrawn_rider_keeps_in_race_flag() {
        let mut state = state_with(&["1"]);
        state.retire_riders(DnfCode::Wd, &bibs("1")).unwrap();
        let rider = state.rider(&Bib::new("1")).unwrap();
        assert!(rider.in_race);
        assert_eq!(rider.comment, Some(DnfCode::Wd));
    }

    #[test]
    fn delete_removes_rider_from_places() {
        let mut state = state_with(&["1", "2", "3"]);
        state.set_places("1 2-3").unwrap();
        state.remove_riders(&bibs("2")).unwrap();
        assert_eq!(state.places().to_string(), "1 3");
        assert!(state.rider(&Bib::new("2")).is_none());
    }

    #[test]
    fn swap_and_clear_places() {
        let mut state = state_with(&["1", "2", "3"]);
        state.set_places("1 2 3").unwrap();
        state.swap_places(&Bib::new("1"), &Bib::new("3")).unwrap();
        assert_eq!(state.places().to_string(), "3 2 1");
        state.clear_place(&Bib::new("2")).unwrap();
        assert_eq!(state.places().to_string(), "3 1");
        assert_eq!(
            state.clear_place(&Bib::new("2")).unwrap_err().error_code(),
            "NOT_PLACED"
        );
    }

    #[test]
    fn add_takes_details_from_directory() {
        let mut state = RaceState::default();
        let mut entry = DirectoryEntry::new("12", "");
        entry.name = "A. Rider".into();
        entry.categories = vec!["a".into()];
        let directory = vec![entry];
        let added = state.add_riders(&directory, &bibs("12 13 12")).unwrap();
        assert_eq!(added, bibs("12 13"));
        let rider = state.rider(&Bib::new("12")).unwrap();
        assert_eq!(rider.name, "A. Rider");
        assert_eq!(rider.categories, vec!["A".to_owned()]);
    }

    #[test]
    fn edit_bunch_forms() {
        let mut state = state_with(&["1", "2"]);
        state.winner_bunch = Some(Tod::from_seconds(3600));
        let down = state.edit_bunch(&Bib::new("1"), "+1:30").unwrap();
        assert_eq!(down, Some(Tod::from_seconds(3690)));
        let same = state.edit_bunch(&Bib::new("2"), "s").unwrap();
        assert_eq!(same, Some(Tod::from_seconds(3690)));
        let absolute = state.edit_bunch(&Bib::new("2"), "1h05:00").unwrap();
        assert_eq!(absolute, Some(Tod::from_seconds(3900)));
        assert_eq!(
            state.edit_bunch(&Bib::new("2"), "soon-ish").unwrap(),
            Some(Tod::from_seconds(3690))
        );
        assert!(state.edit_bunch(&Bib::new("1"), "").unwrap().is_none());
        assert!(state.rider(&Bib::new("1")).unwrap().bunch().is_none());
        assert_eq!(
            state.edit_bunch(&Bib::new("2"), "abc").unwrap_err().error_code(),
            "INVALID_TIME"
        );
    }

    #[test]
    fn edit_bunch_rejects_oversized_times() {
        let mut state = state_with(&["1"]);
        for text in ["99999999999999999", "+9223372036854775807"] {
            let err = state.edit_bunch(&Bib::new("1"), text).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_TIME");
        }
        assert!(state.rider(&Bib::new("1")).unwrap().bunch().is_none());
    }

    #[test]
    fn set_laps_accepts_recount() {
        let mut state = state_with(&["1"]);
        if let Some(rider) = state.riders.get_mut(&Bib::new("1")) {
            rider.set_seen(vec![Tod::from_seconds(60), Tod::from_seconds(120)]);
        }
        assert_eq!(state.set_laps(&Bib::new("1"), "5").unwrap(), 5);
        assert_eq!(state.set_laps(&Bib::new("1"), "?").unwrap(), 2);
        assert_eq!(
            state.set_laps(&Bib::new("1"), "two").unwrap_err(),
            CommandError::InvalidLaps("two".into())
        );
    }

    #[test]
    fn read_only_state_refuses_edits_but_answers_queries() {
        let mut state = state_with(&["1"]);
        state.set_read_only(true);
        let directory: Vec<DirectoryEntry> = Vec::new();
        let err = state
            .apply_command(&directory, RiderCommand::Retire(DnfCode::Dnf, bibs("1")), Tod::ZERO)
            .unwrap_err();
        assert_eq!(err, CommandError::ReadOnly);
        let outcome = state
            .apply_command(&directory, RiderCommand::Query(bibs("1 9")), Tod::ZERO)
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Summary(rows) if rows.len() == 1));
    }
}
