use anyhow::{Context, Result, bail, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::{Level, warn};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use evt::err::EvtResult;
use evt::{AsciiCodepage, EventRecord, EvtParser, ParserSettings, RecoveryMode, ScanOutcome};

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Copy, Clone, PartialOrd, PartialEq, Eq, Debug)]
pub enum EvtOutputFormat {
    Text,
    Json,
    Xml,
}

struct EvtDump {
    parser_settings: ParserSettings,
    input: PathBuf,
    show_record_number: bool,
    output_format: EvtOutputFormat,
    /// Set when `--codepage` was passed, text output then writes strings in that codepage.
    narrow_codepage: Option<AsciiCodepage>,
    output: Box<dyn Write>,
    verbosity_level: Option<Level>,
}

impl EvtDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = PathBuf::from(
            matches
                .get_one::<String>("INPUT")
                .ok_or_else(|| format_err!("INPUT is a required argument"))?,
        );

        let format = matches
            .get_one::<String>("output-format")
            .map(String::as_str)
            .unwrap_or("text");

        let output_format = match format {
            "xml" => EvtOutputFormat::Xml,
            "json" | "jsonl" => EvtOutputFormat::Json,
            _ => EvtOutputFormat::Text,
        };

        let no_indent = match (matches.get_flag("no-indent"), format) {
            // "jsonl" --> --no-indent
            (false, fmt) => fmt == "jsonl",
            (true, fmt) => {
                if fmt == "jsonl" {
                    eprintln!("no need to pass both `--no-indent` and `-o jsonl`");
                }
                true
            }
        };

        let no_show_record_number = match (matches.get_flag("no-show-record-number"), format) {
            // "jsonl" --> --dont-show-record-number
            (false, fmt) => fmt == "jsonl",
            (true, fmt) => {
                if fmt == "jsonl" {
                    eprintln!("no need to pass both `--dont-show-record-number` and `-o jsonl`");
                }
                true
            }
        };

        let narrow_codepage = match matches.get_one::<u32>("codepage") {
            Some(id) => Some(AsciiCodepage::new(*id)?),
            None => None,
        };

        let recovery = if matches.get_flag("recover") {
            RecoveryMode::Always
        } else {
            RecoveryMode::OnCorruption
        };

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than  -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        let output: Box<dyn Write> = match matches.get_one::<String>("output-target") {
            Some(path) => Box::new(Self::create_output_file(
                path,
                !matches.get_flag("no-confirm-overwrite"),
            )?),
            None => Box::new(io::stdout()),
        };

        Ok(EvtDump {
            parser_settings: ParserSettings::new()
                .ascii_codepage(narrow_codepage.unwrap_or_default())
                .recovery(recovery)
                .indent(!no_indent),
            input,
            show_record_number: !no_show_record_number,
            output_format,
            narrow_codepage,
            output,
            verbosity_level,
        })
    }

    /// Main entry point for `EvtDump`
    pub fn run(&mut self) -> Result<()> {
        self.try_to_initialize_logging();

        let opened = if self.input == Path::new("-") {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read input from stdin")?;
            EvtParser::open(
                Box::new(io::Cursor::new(buffer)),
                self.parser_settings.clone(),
            )
        } else {
            EvtParser::open_path(&self.input, self.parser_settings.clone())
        };
        let parser =
            opened.with_context(|| format!("Failed to open file {}", self.input.display()))?;

        if let ScanOutcome::Corrupted { offset, error } = parser.scan_outcome() {
            eprintln!(
                "Log is corrupted at offset {}, only part of the records could be read: {}",
                offset, error
            );
        }

        for record in parser.records() {
            self.dump_record(record, "Record")?;
        }

        for record in parser.recovered_records() {
            self.dump_record(record, "Recovered record")?;
        }

        self.output.flush()?;
        Ok(())
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() {
            if prompt {
                match Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to override output file at {}",
                        p.display()
                    ))
                    .default(false)
                    .interact()
                {
                    Ok(true) => Ok(File::create(p)?),
                    Ok(false) => bail!("Cancelled"),
                    Err(e) => bail!(
                        "Failed to write confirmation prompt to term caused by\n{}",
                        e
                    ),
                }
            } else {
                Ok(File::create(p)?)
            }
        } else {
            // Ok to assume p is not an existing directory
            match p.parent() {
                Some(parent) => {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        fs::create_dir_all(parent)?;
                    }
                    Ok(File::create(p)?)
                }
                None => bail!("Output file cannot be root."),
            }
        }
    }

    fn render(&self, record: &EventRecord) -> EvtResult<Vec<u8>> {
        let rendered = match self.output_format {
            EvtOutputFormat::Json => record.to_json(&self.parser_settings)?.into_bytes(),
            EvtOutputFormat::Xml => record.to_xml(&self.parser_settings)?.into_bytes(),
            EvtOutputFormat::Text => self.render_text(record)?,
        };

        Ok(rendered)
    }

    fn text_field(&self, value: EvtResult<String>, narrow: EvtResult<Vec<u8>>) -> Vec<u8> {
        match (self.narrow_codepage, narrow) {
            (Some(_), Ok(bytes)) => bytes,
            (Some(codepage), Err(e)) => {
                warn!("Writing UTF-8 instead of codepage {}: {}", codepage, e);
                value.unwrap_or_default().into_bytes()
            }
            (None, _) => value.unwrap_or_default().into_bytes(),
        }
    }

    fn render_text(&self, record: &EventRecord) -> EvtResult<Vec<u8>> {
        let codepage = self.parser_settings.get_ascii_codepage();
        let mut out = Vec::new();

        writeln!(out, "Event number\t\t\t: {}", record.record_number)?;
        writeln!(out, "Creation time\t\t\t: {}", record.creation_timestamp()?)?;
        writeln!(out, "Written time\t\t\t: {}", record.written_timestamp()?)?;
        writeln!(
            out,
            "Event identifier\t\t: 0x{:08x} (code {}, severity {:?})",
            record.event_identifier.0,
            record.event_identifier.code(),
            record.event_identifier.severity()
        )?;
        writeln!(
            out,
            "Event type\t\t\t: {} (0x{:04x})",
            record.event_type,
            record.event_type.bits()
        )?;
        writeln!(out, "Event category\t\t\t: {}", record.event_category)?;

        write!(out, "Source name\t\t\t: ")?;
        out.extend(self.text_field(
            record.source_name().map_err(Into::into),
            record.narrow_source_name(codepage).map_err(Into::into),
        ));
        writeln!(out)?;

        write!(out, "Computer name\t\t\t: ")?;
        out.extend(self.text_field(
            record.computer_name().map_err(Into::into),
            record.narrow_computer_name(codepage).map_err(Into::into),
        ));
        writeln!(out)?;

        if let Some(sid) = record.user_sid()? {
            writeln!(out, "User security identifier\t: {}", sid)?;
        }

        let number_of_strings = record.strings().map_or(0, |s| s.number_of_strings());
        writeln!(out, "Number of strings\t\t: {}", number_of_strings)?;
        for index in 0..number_of_strings {
            write!(out, "String: {}\t\t\t: ", index + 1)?;
            out.extend(self.text_field(
                record.string(index).map_err(Into::into),
                record.narrow_string(index, codepage).map_err(Into::into),
            ));
            writeln!(out)?;
        }

        if !record.data().is_empty() {
            writeln!(out, "Data\t\t\t\t:")?;
            write!(out, "{}", evt::hexdump(record.data(), 0))?;
        }

        Ok(out)
    }

    fn dump_record(&mut self, record: &EventRecord, label: &str) -> Result<()> {
        match self.render(record) {
            Ok(rendered) => {
                if self.show_record_number {
                    writeln!(self.output, "{} {}", label, record.record_number)?;
                }
                self.output.write_all(&rendered)?;
                writeln!(self.output)?;
            }
            Err(e) => eprintln!(
                "Failed to render record {} at offset {}: {}",
                record.record_number, record.offset, e
            ),
        }

        Ok(())
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level.to_level_filter(),
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        }
    }
}

fn main() -> Result<()> {
    let matches = Command::new("EVT Parser")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to parse legacy Windows event log (EVT) files")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .help("Path to an EVT file, or `-` to read it from stdin"),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["text", "json", "jsonl", "xml"])
                .default_value("text")
                .help("Sets the output format")
                .long_help(indoc!(
                    r#"Sets the output format:
                        "text"  - prints every record field as text.
                        "xml"   - prints XML output.
                        "json"  - prints JSON output.
                        "jsonl" - (jsonlines) same as json with --no-indent --dont-show-record-number
                "#
                )),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .action(ArgAction::Set)
                .help(indoc!(
                    "Writes output to the file specified instead of stdout, errors will still be printed to stderr.
                       Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`
                       Will create parent directories if needed."
                )),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help(indoc!(
                    "When set, will not ask for confirmation before overwriting files, useful for automation"
                )),
        )
        .arg(
            Arg::new("no-indent")
                .long("no-indent")
                .action(ArgAction::SetTrue)
                .help("When set, output will not be indented."),
        )
        .arg(
            Arg::new("no-show-record-number")
                .long("dont-show-record-number")
                .action(ArgAction::SetTrue)
                .help("When set, `Record <id>` will not be printed."),
        )
        .arg(
            Arg::new("codepage")
                .long("codepage")
                .value_parser(clap::value_parser!(u32))
                .help(indoc!(
                    "Windows codepage of narrow strings (e.g. 1252, 1251, 20127).
                       When set, text output writes names and strings in this codepage."
                )),
        )
        .arg(
            Arg::new("recover")
                .long("recover")
                .action(ArgAction::SetTrue)
                .help("When set, also recovers records from free space of healthy logs."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help(indoc!(
                    r#"Sets debug prints level for the application:
                        -v   - info
                        -vv  - debug
                        -vvv - trace
                    NOTE: trace output is only available in debug builds, as it is extremely verbose."#
                )),
        )
        .get_matches();

    let mut app = EvtDump::from_cli_matches(&matches)?;

    app.run()
}
