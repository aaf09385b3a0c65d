//! Roster command-line entry point.
//!
//! # Responsibility
//! - Drive the core use-cases against an on-disk database.
//! - Keep output line-oriented and deterministic for scripting.

use clap::{Parser, Subcommand};
use log::error;
use roster_core::{
    default_log_level, init_logging, open_db_with, transaction_with, Direction, FetchGraph,
    MemberField, MemberFilter, MemberRepository, PageRequest, RosterService, RosterServiceError,
    Session, Sort, SqliteMemberRepository, SqliteTeamRepository, StoreConfig,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const PAGE_SIZE: u64 = 3;

#[derive(Debug, Parser)]
#[command(name = "roster", about = "Member and team roster over SQLite", version)]
struct Cli {
    /// SQLite database file; created and migrated when missing.
    db_path: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Insert two teams and four members.
    Seed,
    /// Print one page of members sorted by username, newest name first.
    Page {
        /// Zero-based page index.
        number: u64,
    },
    /// Add one year to every member at or above an age.
    AgeUp {
        #[arg(allow_negative_numbers = true)]
        age: i32,
    },
    /// Print the member/team projection (default).
    Dto,
}

impl Cli {
    fn selected(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Dto)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let db_path = absolute(&cli.db_path)?;
    let log_dir = db_path
        .parent()
        .map(|dir| dir.join("logs"))
        .ok_or_else(|| format!("`{}` has no parent directory", db_path.display()))?;
    init_logging(default_log_level(), &log_dir.to_string_lossy())?;

    let config = StoreConfig::from_env().map_err(|err| err.to_string())?;
    let mut conn = open_db_with(&db_path, &config).map_err(|err| err.to_string())?;

    let command = cli.selected();
    let result = transaction_with(&mut conn, &config, |session| execute(session, &command));
    result.map_err(|err| {
        error!("event=cli_command module=cli status=error error={err}");
        err.to_string()
    })
}

fn absolute(path: &Path) -> Result<PathBuf, String> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|err| format!("cannot resolve cwd: {err}"))?;
    Ok(cwd.join(path))
}

fn execute(session: &Session<'_>, command: &Commands) -> Result<(), RosterServiceError> {
    let service = RosterService::new(
        SqliteMemberRepository::try_new(session)?,
        SqliteTeamRepository::new(session),
    );

    match command {
        Commands::Seed => {
            let team_a = service.create_team("teamA")?;
            let team_b = service.create_team("teamB")?;
            for (index, age) in [10, 20, 30, 40].into_iter().enumerate() {
                let member = service.register_member(format!("member{}", index + 1), age)?;
                let team = if index < 2 { &team_a } else { &team_b };
                if let (Some(member_id), Some(team_id)) = (member.id, team.id) {
                    service.assign_team(member_id, team_id)?;
                }
            }
            println!("seeded teams=2 members=4");
        }
        Commands::Page { number } => {
            let request = PageRequest::of_sorted(
                *number,
                PAGE_SIZE,
                Sort::by(Direction::Desc, MemberField::Username),
            )?;
            let page = service
                .members()
                .find_page(&MemberFilter::all(), &request, FetchGraph::team())?;
            for member in page.content() {
                let team = service.members().session().team_of(member)?;
                println!(
                    "{}\t{}\t{}\t{}",
                    member.id.unwrap_or_default(),
                    member.username,
                    member.age,
                    team.map(|team| team.name).unwrap_or_default()
                );
            }
            println!(
                "page={} of={} total={}",
                page.number(),
                page.total_pages(),
                page.total_elements()
            );
        }
        Commands::AgeUp { age } => {
            let affected = service.age_up_from(*age)?;
            println!("aged up members={affected}");
        }
        Commands::Dto => {
            for dto in service.members().find_member_dto()? {
                println!(
                    "{}\t{}\t{}",
                    dto.id,
                    dto.username,
                    dto.team_name.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn db_path_is_required() {
        assert!(Cli::try_parse_from(["roster"]).is_err());
    }

    #[test]
    fn missing_command_defaults_to_dto() {
        let cli = Cli::try_parse_from(["roster", "roster.db"]).unwrap();
        assert_eq!(cli.db_path, Path::new("roster.db"));
        assert_eq!(cli.selected(), Commands::Dto);
    }

    #[test]
    fn numeric_operands_are_parsed() {
        let cli = Cli::try_parse_from(["roster", "roster.db", "page", "2"]).unwrap();
        assert_eq!(cli.selected(), Commands::Page { number: 2 });

        let cli = Cli::try_parse_from(["roster", "roster.db", "age-up", "20"]).unwrap();
        assert_eq!(cli.selected(), Commands::AgeUp { age: 20 });

        let cli = Cli::try_parse_from(["roster", "roster.db", "age-up", "-1"]).unwrap();
        assert_eq!(cli.selected(), Commands::AgeUp { age: -1 });

        assert!(Cli::try_parse_from(["roster", "roster.db", "age-up", "old"]).is_err());
        assert!(Cli::try_parse_from(["roster", "roster.db", "page"]).is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["roster", "roster.db", "purge"]).is_err());
    }

    #[test]
    fn definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
