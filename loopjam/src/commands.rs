//! Line commands read from stdin.

use thiserror::Error;

use loopjam_types::{LoopId, NoteEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Trigger { loop_id: LoopId, active: bool },
    Volume { loop_id: LoopId, volume: f32 },
    Transpose { loop_id: LoopId, semitones: i32 },
    Pattern { loop_id: LoopId, notes: Vec<NoteEvent> },
    Vote(usize),
    Create { memory: bool },
    Queue(usize),
    Change(usize),
    Play,
    Stop,
    Tempo(f32),
    Ping,
    State,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
trigger <loop> on|off     start or stop one of your loops
volume <loop> <0-2>       set loop volume
transpose <loop> <n>      transpose loop by semitones
pattern <loop> <note:beat[:dur]>...
                          replace a loop's pattern
vote <section>            vote to switch section
create [memory]           vote to save the playing loops as a section
queue <section>           (leader) switch at the next bar
change <section>          (leader) switch now
play | stop | tempo <bpm> (leader) transport
ping                      measure latency
state                     print the room
quit";

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(ParseError::Empty);
    };
    let args: Vec<&str> = words.collect();

    match (verb.to_lowercase().as_str(), args.as_slice()) {
        ("trigger" | "t", [loop_id, state]) => {
            let active = match state.to_lowercase().as_str() {
                "on" | "1" | "true" => true,
                "off" | "0" | "false" => false,
                _ => return Err(ParseError::Usage("trigger <loop> on|off")),
            };
            Ok(Command::Trigger { loop_id: LoopId::new(*loop_id), active })
        }
        ("trigger" | "t", _) => Err(ParseError::Usage("trigger <loop> on|off")),
        ("volume", [loop_id, volume]) => match volume.parse::<f32>() {
            Ok(volume) if volume.is_finite() => {
                Ok(Command::Volume { loop_id: LoopId::new(*loop_id), volume })
            }
            _ => Err(ParseError::Usage("volume <loop> <0-2>")),
        },
        ("volume", _) => Err(ParseError::Usage("volume <loop> <0-2>")),
        ("transpose", [loop_id, n]) => n
            .parse()
            .map(|semitones| Command::Transpose { loop_id: LoopId::new(*loop_id), semitones })
            .map_err(|_| ParseError::Usage("transpose <loop> <semitones>")),
        ("transpose", _) => Err(ParseError::Usage("transpose <loop> <semitones>")),
        ("pattern", [loop_id, notes @ ..]) => {
            let notes = notes
                .iter()
                .map(|n| parse_note(n))
                .collect::<Option<Vec<_>>>()
                .ok_or(ParseError::Usage("pattern <loop> <note:beat[:dur]>..."))?;
            Ok(Command::Pattern { loop_id: LoopId::new(*loop_id), notes })
        }
        ("pattern", _) => Err(ParseError::Usage("pattern <loop> <note:beat[:dur]>...")),
        ("vote", [i]) => index(i, "vote <section>").map(Command::Vote),
        ("vote", _) => Err(ParseError::Usage("vote <section>")),
        ("create", []) => Ok(Command::Create { memory: false }),
        ("create", ["memory" | "mem" | "m"]) => Ok(Command::Create { memory: true }),
        ("create", _) => Err(ParseError::Usage("create [memory]")),
        ("queue", [i]) => index(i, "queue <section>").map(Command::Queue),
        ("queue", _) => Err(ParseError::Usage("queue <section>")),
        ("change", [i]) => index(i, "change <section>").map(Command::Change),
        ("change", _) => Err(ParseError::Usage("change <section>")),
        ("play", []) => Ok(Command::Play),
        ("stop", []) => Ok(Command::Stop),
        ("tempo", [bpm]) => match bpm.parse::<f32>() {
            Ok(bpm) if bpm.is_finite() => Ok(Command::Tempo(bpm)),
            _ => Err(ParseError::Usage("tempo <bpm>")),
        },
        ("tempo", _) => Err(ParseError::Usage("tempo <bpm>")),
        ("ping", []) => Ok(Command::Ping),
        ("state" | "s", []) => Ok(Command::State),
        ("help" | "?", _) => Ok(Command::Help),
        ("quit" | "exit" | "q", []) => Ok(Command::Quit),
        (other, _) => Err(ParseError::Unknown(other.to_string())),
    }
}

fn index(word: &str, usage: &'static str) -> Result<usize, ParseError> {
    word.parse().map_err(|_| ParseError::Usage(usage))
}

/// `kick:0`, `C3:1.5:8n`. Duration defaults to `8n`.
fn parse_note(word: &str) -> Option<NoteEvent> {
    let mut parts = word.split(':');
    let note = parts.next().filter(|n| !n.is_empty())?;
    let time: f32 = parts.next()?.parse().ok().filter(|t: &f32| t.is_finite() && *t >= 0.0)?;
    let duration = parts.next().unwrap_or("8n");
    if parts.next().is_some() {
        return None;
    }
    Some(NoteEvent::new(note, time, duration))
}
