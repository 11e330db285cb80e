//! Plain-text result tables.

use std::io::{self, Write};

use race_core::{CommandOutcome, StandingRow, Standings, TallyTable, Tod};

fn time(value: Option<Tod>) -> String {
    value.map(|t| t.rawtime(0)).unwrap_or_default()
}

fn signed(prefix: char, value: Option<Tod>) -> String {
    value.map(|t| format!("{prefix}{}", t.rawtime(0))).unwrap_or_default()
}

/// Writes result rows, one rider per line.
pub fn write_rows(out: &mut impl Write, rows: &[StandingRow]) -> io::Result<()> {
    for row in rows {
        writeln!(
            out,
            "{:<5} {:>5} {:<24} {:<8} {:>3} {:>9} {:>9} {:>6} {:>6}",
            row.rank_text(),
            row.bib,
            row.name,
            row.categories.join(" "),
            row.laps,
            time(row.bunch),
            signed('+', row.down),
            signed('-', row.bonus),
            signed('+', row.penalty),
        )?;
    }
    Ok(())
}

/// Writes a points tally, best first.
pub fn write_tally(out: &mut impl Write, table: &TallyTable) -> io::Result<()> {
    writeln!(out, "{} {}", table.code, table.description)?;
    for row in &table.rows {
        writeln!(out, "{:<5} {:>5} {:<24} {:>5}", format!("{}.", row.rank), row.bib, row.name, row.points)?;
    }
    Ok(())
}

/// Writes the full result: status line, rows and every tally.
pub fn write_standings(out: &mut impl Write, standings: &Standings) -> io::Result<()> {
    writeln!(out, "status: {}", standings.status)?;
    write_rows(out, &standings.rows)?;
    for table in &standings.tallies {
        writeln!(out)?;
        write_tally(out, table)?;
    }
    Ok(())
}

/// Echoes what a rider command did.
pub fn write_outcome(out: &mut impl Write, outcome: &CommandOutcome) -> io::Result<()> {
    match outcome {
        CommandOutcome::Updated(bibs) if !bibs.is_empty() => {
            let bibs: Vec<String> = bibs.iter().map(ToString::to_string).collect();
            writeln!(out, "updated {}", bibs.join(" "))
        }
        CommandOutcome::Updated(_) | CommandOutcome::Noted => Ok(()),
        CommandOutcome::Summary(riders) => {
            for rider in riders {
                let status = match (rider.comment, rider.in_race) {
                    (Some(code), _) => code.to_string(),
                    (None, true) => "in".to_owned(),
                    (None, false) => "out".to_owned(),
                };
                writeln!(
                    out,
                    "{:>5} {:<24} {:<4} laps={} passings={} last={}",
                    rider.bib,
                    rider.name,
                    status,
                    rider.laps,
                    rider.passings,
                    time(rider.last_passing),
                )?;
            }
            Ok(())
        }
        CommandOutcome::Passings(outcomes) => {
            for outcome in outcomes {
                writeln!(out, "{outcome:?}")?;
            }
            Ok(())
        }
        CommandOutcome::Places(places) => writeln!(out, "places {places}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use race_core::{Bib, RaceStatus, TallyRow};

    fn row(rank: Option<u32>, bib: &str) -> StandingRow {
        StandingRow {
            rank,
            code: None,
            bib: Bib::new(bib),
            name: format!("Rider {bib}"),
            categories: vec!["A".into()],
            laps: 3,
            bunch: Some(Tod::from_seconds(3725)),
            down: None,
            bonus: None,
            penalty: None,
        }
    }

    #[test]
    fn standings_table_lists_rows_then_tallies() {
        let mut second = row(Some(2), "7");
        second.down = Some(Tod::from_seconds(12));
        second.bonus = Some(Tod::from_seconds(4));
        let standings = Standings {
            status: RaceStatus::Provisional,
            rows: vec![row(Some(1), "3"), second],
            tallies: vec![TallyTable {
                code: "sprint".into(),
                description: "Sprint".into(),
                rows: vec![TallyRow {
                    rank: 1,
                    bib: Bib::new("7"),
                    name: "Rider 7".into(),
                    points: 5,
                    countback: Default::default(),
                }],
            }],
        };

        let mut out = Vec::new();
        write_standings(&mut out, &standings).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "status: provisional");
        assert!(lines[1].starts_with("1."));
        assert!(lines[1].contains("Rider 3"));
        assert!(lines[2].contains("+12"));
        assert!(lines[2].contains("-4"));
        assert_eq!(lines[4], "sprint Sprint");
        assert!(lines[5].ends_with('5'));
    }

    #[test]
    fn empty_update_prints_nothing() {
        let mut out = Vec::new();
        write_outcome(&mut out, &CommandOutcome::Updated(Vec::new())).unwrap();
        write_outcome(&mut out, &CommandOutcome::Places("1 2".into())).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "places 1 2\n");
    }
}
