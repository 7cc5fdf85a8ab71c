//! `notes`, a small note-taking CLI wired through a grouped command
//! dispatcher.
//!
//! Demonstrates the full registration-to-dispatch flow: top-level commands
//! as groups with default commands (`notes add ...`), a two-level group
//! (`notes tag set ...`), argument schemas with defaults, shared state
//! through the command context, an observer that echoes dispatches to
//! stderr, and a usage listing for unknown commands. Notes live in a JSON
//! file (`NOTES_FILE`, default `notes.json`).

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use switchboard::{
    observer_fn, results, Arg, ArgKind, CommandContext, Extensions, GroupDispatcher,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Note {
    id: u64,
    text: String,
    done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

/// JSON-file-backed note storage.
struct Store {
    path: PathBuf,
}

impl Store {
    fn open() -> Self {
        let path = std::env::var_os("NOTES_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("notes.json"));
        Self { path }
    }

    fn load(&self) -> anyhow::Result<Vec<Note>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", self.path.display()))
    }

    fn save(&self, notes: &[Note]) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(notes)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("writing {}", self.path.display()))
    }

    fn update(&self, id: i64, f: impl FnOnce(&mut Note)) -> anyhow::Result<Note> {
        let mut notes = self.load()?;
        let note = notes
            .iter_mut()
            .find(|n| n.id == id as u64)
            .with_context(|| format!("no note with id {id}"))?;
        f(note);
        let updated = note.clone();
        self.save(&notes)?;
        Ok(updated)
    }
}

fn add(ctx: &CommandContext, text: String) -> anyhow::Result<Note> {
    let store = ctx.app_state.get_required::<Store>()?;
    let mut notes = store.load()?;
    let id = notes.iter().map(|n| n.id).max().unwrap_or(0) + 1;
    let note = Note {
        id,
        text,
        done: false,
        tag: None,
    };
    notes.push(note.clone());
    store.save(&notes)?;
    Ok(note)
}

fn list(ctx: &CommandContext, only_open: bool) -> anyhow::Result<Vec<Note>> {
    let store = ctx.app_state.get_required::<Store>()?;
    let mut notes = store.load()?;
    if only_open {
        notes.retain(|n| !n.done);
    }
    Ok(notes)
}

fn done(ctx: &CommandContext, id: i64) -> anyhow::Result<Note> {
    let store = ctx.app_state.get_required::<Store>()?;
    store.update(id, |note| note.done = true)
}

fn tag_set(ctx: &CommandContext, id: i64, tag: String) -> anyhow::Result<Note> {
    let store = ctx.app_state.get_required::<Store>()?;
    store.update(id, |note| note.tag = Some(tag))
}

fn tag_clear(ctx: &CommandContext, id: i64) -> anyhow::Result<Note> {
    let store = ctx.app_state.get_required::<Store>()?;
    store.update(id, |note| note.tag = None)
}

fn build_dispatcher() -> anyhow::Result<GroupDispatcher> {
    let stdout = || results::json_to(io::stdout());
    let mut dispatcher = GroupDispatcher::with_observers(vec![observer_fn(|command, args| {
        eprintln!("-> {command} {}", args.join(" "));
    })]);

    // Bare `notes` shows the open notes.
    dispatcher.add_default_command(
        "shows all open notes",
        |ctx: &CommandContext| list(ctx, true),
        vec![],
        vec![stdout()],
    )?;

    // Top-level commands are groups with a default command.
    dispatcher.add_group("add")?.add_default_command(
        "adds a note",
        add,
        vec![Arg::new("text", ArgKind::Str).describe("the note text")],
        vec![stdout()],
    )?;
    dispatcher.add_group("list")?.add_default_command(
        "lists notes",
        list,
        vec![Arg::new("only_open", ArgKind::Bool)
            .describe("hide completed notes")
            .default_value("true")],
        vec![stdout()],
    )?;
    dispatcher.add_group("done")?.add_default_command(
        "marks a note as completed",
        done,
        vec![Arg::new("id", ArgKind::Int).describe("the note id")],
        vec![stdout()],
    )?;

    // `tag` has real sub-commands: `notes tag set 3 urgent`.
    let tag = dispatcher.add_group("tag")?;
    tag.add_command(
        "set",
        "tags a note",
        tag_set,
        vec![
            Arg::new("id", ArgKind::Int).describe("the note id"),
            Arg::new("tag", ArgKind::Str).describe("the tag to apply"),
        ],
        vec![stdout()],
    )?;
    tag.add_command(
        "clear",
        "removes a note's tag",
        tag_clear,
        vec![Arg::new("id", ArgKind::Int).describe("the note id")],
        vec![stdout()],
    )?;

    Ok(dispatcher)
}

fn run() -> anyhow::Result<i32> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let dispatcher = build_dispatcher()?;

    let mut app_state = Extensions::new();
    app_state.insert(Store::open());
    let ctx = CommandContext::new(args.clone(), Arc::new(app_state));

    match dispatcher.dispatch_args(&ctx, &args) {
        Ok(_) => Ok(0),
        Err(err) if err.is_not_found() => {
            let mut stderr = io::stderr();
            writeln!(stderr, "{err}\n\nAvailable commands:")?;
            dispatcher.print_commands("notes", &mut stderr)?;
            Ok(2)
        }
        Err(err) => Err(err.into()),
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("notes: {err:#}");
            std::process::exit(1);
        }
    }
}
