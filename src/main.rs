use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use rusqlite::types::Value;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;

use cli_style::{
    get_prompt, get_styles, print_banner, print_collection_tree, print_groups, print_listing,
    print_model, print_outcome, Outcome,
};
use repertoire::catalog::{CollectionHandler, EntryFilter, NewTrack, TrackDbHandler};
use repertoire::config::{AppConfig, CliConfig, FileConfig};
use repertoire::table_handler::{Comparison, Condition, SelectQuery};
use repertoire::view::{CollectionTree, SortOrder, TableModel};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles(), version)]
struct CliArgs {
    /// Path to the SQLite catalog database file.
    #[clap(value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Do not create missing catalog tables on startup.
    #[clap(long)]
    pub no_init: bool,

    /// Default log level when LOG_LEVEL is not set.
    #[clap(long)]
    pub log_level: Option<String>,
}

#[derive(Parser)]
#[command(styles=get_styles(), name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Lists the tables of the database.
    Tables,

    /// Shows the columns of a table.
    Describe { table: String },

    /// Prints the rows of a table.
    Show {
        table: String,

        /// Only these columns, comma separated.
        #[clap(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Filter as column=value, may be repeated. Conditions are AND-ed.
        #[clap(long = "where")]
        conditions: Vec<String>,

        /// Column to sort by.
        #[clap(long)]
        sort: Option<String>,

        #[clap(long)]
        desc: bool,
    },

    /// Prints tracks with interpreter, composer and genre names.
    Entries {
        /// Filter as table.column=value, e.g. composers.composer_name=Bach
        #[clap(long)]
        filter: Option<String>,

        /// Print JSON instead of a table.
        #[clap(long)]
        json: bool,
    },

    /// Adds a track. Unknown interpreters, composers and genres are created.
    AddTrack {
        name: String,
        #[clap(long)]
        year: Option<i64>,
        #[clap(long)]
        interpreter: Option<String>,
        #[clap(long)]
        composer: Option<String>,
        #[clap(long)]
        genre: Option<String>,
        #[clap(long)]
        media: Option<String>,
        #[clap(long)]
        sheet: Option<String>,
        #[clap(long)]
        thumbnail: Option<String>,
    },

    /// Sets one column on the rows matching the filters.
    /// Foreign-key columns take a name and need --key-table.
    Change {
        table: String,
        column: String,
        value: String,

        /// Lookup table for foreign-key columns, e.g. composers.
        #[clap(long)]
        key_table: Option<String>,

        /// Filter as column=value, may be repeated. Without filters every row changes.
        #[clap(long = "where")]
        conditions: Vec<String>,
    },

    /// Removes tracks identical in every column but the id, keeping the newest.
    Dedup,

    /// Lists all collections.
    Collections,

    /// Shows the tracks and groups of a collection, creating it if needed.
    Collection { name: String },

    /// Adds a track to a collection.
    Collect { name: String, track_id: i64 },

    /// Removes a track from a collection.
    Uncollect { name: String, track_id: i64 },

    /// Shows all collections with their groups.
    Tree,

    /// Checks the database against the catalog schema.
    Validate,

    /// Drops every table. Needs --yes.
    Wipe {
        #[clap(long)]
        yes: bool,
    },

    /// Shows the path of the current database.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

/// Integers bind as INTEGER, `null` as NULL, anything else as TEXT.
fn parse_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    match s.parse::<i64>() {
        Ok(i) => Value::Integer(i),
        Err(_) => Value::Text(s.to_string()),
    }
}

fn parse_condition(s: &str) -> std::result::Result<Condition, String> {
    for op in ["<=", ">=", "!=", "<>", "=", "<", ">"] {
        if let Some((column, value)) = s.split_once(op) {
            let comparison = Comparison::parse(op).ok_or_else(|| format!("Bad operator {}", op))?;
            return Ok(Condition::new(column.trim(), comparison, parse_value(value.trim())));
        }
    }
    Err(format!("Expected column=value, got '{}'", s))
}

fn execute_command(line: String, db: &TrackDbHandler, db_path: &str) -> CommandExecutionResult {
    if line.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => {
            match cli.command {
                InnerCommand::Tables => {
                    let tables = db.table_handler();
                    match tables.fetch_table_list() {
                        Ok(names) => {
                            let items: Vec<String> = names
                                .into_iter()
                                .map(|name| match tables.fetch_table_description(&name) {
                                    Ok(columns) => format!("{} ({} columns)", name, columns.len()),
                                    Err(_) => name,
                                })
                                .collect();
                            print_listing("Tables", &items);
                        }
                        Err(err) => return CommandExecutionResult::Error(err.to_string()),
                    }
                }
                InnerCommand::Describe { table } => {
                    match db.table_handler().fetch_table_description(&table) {
                        Ok(columns) => print_listing(&table, &columns),
                        Err(err) => return CommandExecutionResult::Error(err.to_string()),
                    }
                }
                InnerCommand::Show {
                    table,
                    columns,
                    conditions,
                    sort,
                    desc,
                } => {
                    let mut query = SelectQuery::new(table).columns(columns);
                    for condition in conditions {
                        match parse_condition(&condition) {
                            Ok(condition) => query = query.filter(condition),
                            Err(err) => return CommandExecutionResult::Error(err),
                        }
                    }
                    let mut model = TableModel::load(db.table_handler(), &query);
                    if model.column_count() == 0 {
                        print_outcome(Outcome::Failed, &format!("No data loaded from {}", query.table));
                    }
                    if let Some(sort) = sort {
                        match model.headers().iter().position(|h| *h == sort) {
                            Some(column) => {
                                let order = if desc {
                                    SortOrder::Descending
                                } else {
                                    SortOrder::Ascending
                                };
                                model.sort_by_column(column, order);
                            }
                            None => print_outcome(
                                Outcome::Skipped,
                                &format!("No column {} to sort by", sort),
                            ),
                        }
                    }
                    print_model(&model);
                }
                InnerCommand::Entries { filter, json } => {
                    let filter = match filter {
                        Some(filter) => {
                            let parsed = filter
                                .split_once('=')
                                .and_then(|(target, value)| {
                                    EntryFilter::parse(target.trim(), parse_value(value.trim()))
                                });
                            match parsed {
                                Some(parsed) => Some(parsed),
                                None => {
                                    return CommandExecutionResult::Error(format!(
                                        "Expected table.column=value, got '{}'",
                                        filter
                                    ))
                                }
                            }
                        }
                        None => None,
                    };
                    let entries = match db.get_entries(filter.as_ref()) {
                        Ok(entries) => entries,
                        Err(err) => return CommandExecutionResult::Error(err.to_string()),
                    };
                    if json {
                        match serde_json::to_string_pretty(&entries) {
                            Ok(json) => println!("{}", json),
                            Err(err) => return CommandExecutionResult::Error(err.to_string()),
                        }
                    } else {
                        print_model(&TableModel::from_entries(&entries));
                    }
                }
                InnerCommand::AddTrack {
                    name,
                    year,
                    interpreter,
                    composer,
                    genre,
                    media,
                    sheet,
                    thumbnail,
                } => {
                    let track = NewTrack {
                        track_name: name,
                        year,
                        interpreter,
                        composer,
                        genre,
                        media_location: media,
                        sheet_location: sheet,
                        thumbnail_location: thumbnail,
                    };
                    match db.input_entries(&[track]) {
                        Ok(0) => print_outcome(Outcome::Skipped, "An identical track already exists"),
                        Ok(_) => print_outcome(Outcome::Done, "Track added"),
                        Err(err) => return CommandExecutionResult::Error(err.to_string()),
                    }
                }
                InnerCommand::Change {
                    table,
                    column,
                    value,
                    key_table,
                    conditions,
                } => {
                    let mut parsed = Vec::with_capacity(conditions.len());
                    for condition in conditions {
                        match parse_condition(&condition) {
                            Ok(condition) => parsed.push(condition),
                            Err(err) => return CommandExecutionResult::Error(err),
                        }
                    }
                    match db.change_value(
                        &table,
                        &column,
                        parse_value(&value),
                        key_table.as_deref(),
                        &parsed,
                    ) {
                        Ok(changed) => {
                            print_outcome(Outcome::Done, &format!("{} row(s) changed", changed))
                        }
                        Err(err) => return CommandExecutionResult::Error(err.to_string()),
                    }
                }
                InnerCommand::Dedup => match db.remove_duplicates() {
                    Ok(removed) => {
                        print_outcome(Outcome::Done, &format!("{} duplicate(s) removed", removed))
                    }
                    Err(err) => return CommandExecutionResult::Error(err.to_string()),
                },
                InnerCommand::Collections => match db.collection_names() {
                    Ok(names) => print_listing("Collections", &names),
                    Err(err) => return CommandExecutionResult::Error(err.to_string()),
                },
                InnerCommand::Collection { name } => {
                    let handler = match CollectionHandler::new(name.as_str(), db) {
                        Ok(handler) => handler,
                        Err(err) => return CommandExecutionResult::Error(err.to_string()),
                    };
                    match handler.get_all_entries() {
                        Ok(entries) => print_model(&TableModel::from_entries(&entries)),
                        Err(err) => print_outcome(Outcome::Failed, &err.to_string()),
                    }
                    print_groups(handler.groups());
                }
                InnerCommand::Collect { name, track_id } => {
                    let result = CollectionHandler::new(name.as_str(), db)
                        .and_then(|mut handler| handler.add_entry(track_id).map(|added| (handler, added)));
                    match result {
                        Ok((handler, true)) => {
                            print_outcome(
                                Outcome::Done,
                                &format!("Track {} added to {}", track_id, name),
                            );
                            print_groups(handler.groups());
                        }
                        Ok((_, false)) => print_outcome(
                            Outcome::Skipped,
                            &format!("Track {} already is in {}", track_id, name),
                        ),
                        Err(err) => return CommandExecutionResult::Error(err.to_string()),
                    }
                }
                InnerCommand::Uncollect { name, track_id } => {
                    let result = CollectionHandler::new(name.as_str(), db)
                        .and_then(|mut handler| handler.delete_entry(track_id));
                    match result {
                        Ok(0) => print_outcome(
                            Outcome::Skipped,
                            &format!("Track {} is not in {}", track_id, name),
                        ),
                        Ok(_) => print_outcome(
                            Outcome::Done,
                            &format!("Track {} removed from {}", track_id, name),
                        ),
                        Err(err) => return CommandExecutionResult::Error(err.to_string()),
                    }
                }
                InnerCommand::Tree => print_collection_tree(&CollectionTree::build(db)),
                InnerCommand::Validate => match db.validate_schema() {
                    Ok(()) => print_outcome(Outcome::Done, "Schema is valid"),
                    Err(err) => return CommandExecutionResult::Error(format!("{:#}", err)),
                },
                InnerCommand::Wipe { yes } => {
                    if !yes {
                        print_outcome(
                            Outcome::Skipped,
                            "This drops every table, run 'wipe --yes' to confirm",
                        );
                    } else {
                        match db.wipe_db() {
                            Ok(()) => print_outcome(Outcome::Done, "All tables dropped"),
                            Err(err) => return CommandExecutionResult::Error(err.to_string()),
                        }
                    }
                }
                InnerCommand::Where => {
                    print_listing("Database", &[db_path.to_string()]);
                }
                InnerCommand::Exit => return CommandExecutionResult::Exit,
            }
        }

        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
        }
    }
    CommandExecutionResult::Ok
}

#[derive(rustyline_derive::Hinter)]
struct ShellHelper {
    commands_names: Vec<String>,
}

impl ShellHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        ShellHelper { commands_names }
    }
}

impl Completer for ShellHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for ShellHelper {}
impl Validator for ShellHelper {}
impl Helper for ShellHelper {}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_path: cli_args.db_path.clone(),
        log_level: cli_args.log_level.clone(),
        no_init: cli_args.no_init,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(config.log_level).into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install the log subscriber")?;

    let db = TrackDbHandler::open(&config.db_path, config.initialize_schema)
        .with_context(|| format!("Could not open catalog database {:?}", config.db_path))?;
    for name in &config.collections {
        let id = db
            .ensure_collection(name)
            .with_context(|| format!("Could not create collection {}", name))?;
        info!("Collection {} has id {}", name, id);
    }
    let db_path = config.db_path.display().to_string();

    let rl_config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<ShellHelper, FileHistory>::with_config(rl_config)?;
    rl.set_helper(Some(ShellHelper::new()));

    print_banner(&db_path, db.table_handler().tables().len());

    let prompt = get_prompt();
    loop {
        let readline = rl.readline(&prompt);

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                let _ = rl.add_history_entry(&line);
                match execute_command(line, &db, &db_path) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => {
                        break;
                    }
                    CommandExecutionResult::Error(err) => {
                        print_outcome(Outcome::Failed, &err);
                        continue;
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                print_outcome(Outcome::Failed, &format!("{:?}", e));
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_parse_by_shape() {
        assert_eq!(parse_value("1722"), Value::Integer(1722));
        assert_eq!(parse_value("NULL"), Value::Null);
        assert_eq!(parse_value("Bach"), Value::Text("Bach".to_string()));
    }

    #[test]
    fn conditions_parse_operators() {
        let condition = parse_condition("year>=1700").unwrap();
        assert_eq!(condition.column, "year");
        assert_eq!(condition.comparison, Comparison::GtEq);
        assert_eq!(condition.value, Value::Integer(1700));

        let condition = parse_condition("composer_name = Bach").unwrap();
        assert_eq!(condition.comparison, Comparison::Eq);
        assert_eq!(condition.value, Value::Text("Bach".to_string()));

        assert!(parse_condition("year").is_err());
    }

    #[test]
    fn inner_cli_parses_commands() {
        let cli = InnerCli::try_parse_from([" ", "show", "tracks", "--columns", "track_id,year"]).unwrap();
        match cli.command {
            InnerCommand::Show { table, columns, .. } => {
                assert_eq!(table, "tracks");
                assert_eq!(columns, vec!["track_id", "year"]);
            }
            _ => panic!("expected show"),
        }
        assert!(InnerCli::try_parse_from([" ", "collect", "Fav", "x"]).is_err());
    }
}
