//! Standard MIDI File front-end
//!
//! Decodes SMF bytes with `midly` and flattens every track into one event
//! stream ordered by absolute tick (ties broken by track order, then by
//! position within the track).

use crate::error::{Result, SegmentError};
use crate::models::{Event, EventKind, EventStream, TieFlag};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

pub fn parse_midi(bytes: &[u8]) -> Result<EventStream> {
    let smf = Smf::parse(bytes).map_err(|e| SegmentError::Midi(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpq) => tpq.as_int() as u32,
        Timing::Timecode(fps, subframes) => {
            return Err(SegmentError::Configuration(format!(
                "timecode timing ({} fps, {} subframes) has no beat grid",
                fps.as_int(),
                subframes
            )))
        }
    };

    // (absolute tick, track index, event)
    let mut timed: Vec<(u64, usize, EventKind)> = Vec::new();
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            if let Some(kind) = convert_event(&event.kind) {
                timed.push((tick, track_index, kind));
            }
        }
    }
    timed.sort_by_key(|(tick, track_index, _)| (*tick, *track_index));

    let mut events = Vec::with_capacity(timed.len());
    let mut last_tick = 0u64;
    for (tick, _, kind) in timed {
        events.push(Event::new((tick - last_tick) as i64, kind));
        last_tick = tick;
    }

    log::debug!(
        "decoded {} midi events from {} tracks at {} ticks per beat",
        events.len(),
        smf.tracks.len(),
        ticks_per_beat
    );
    Ok(EventStream::new(ticks_per_beat, events))
}

fn convert_event(kind: &TrackEventKind) -> Option<EventKind> {
    match kind {
        TrackEventKind::Midi { message, .. } => match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => Some(EventKind::NoteOn {
                pitch: key.as_int(),
                intensity: Some(vel.as_int()),
                tie: TieFlag::None,
            }),
            // Note-on with velocity 0 is a note-off
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                Some(EventKind::NoteOff {
                    pitch: key.as_int(),
                    tie: TieFlag::None,
                })
            }
            _ => None,
        },
        TrackEventKind::Meta(meta) => match meta {
            MetaMessage::TimeSignature(numerator, denominator_power, _, _) => {
                Some(EventKind::TimeSignatureChange {
                    numerator: *numerator as u32,
                    // out-of-range powers surface as a zero denominator
                    denominator: 2u32.checked_pow(*denominator_power as u32).unwrap_or(0),
                })
            }
            MetaMessage::Tempo(micros) => Some(EventKind::TempoChange {
                micros_per_quarter: micros.as_int(),
            }),
            MetaMessage::KeySignature(fifths, minor) => Some(EventKind::KeySignatureChange {
                fifths: *fifths,
                minor: *minor,
            }),
            _ => None,
        },
        _ => None,
    }
}
