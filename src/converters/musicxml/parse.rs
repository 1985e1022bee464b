use crate::error::{Result, SegmentError};
use crate::models::{pitch_number_from_step, Event, EventKind, EventStream, TieFlag};
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;

/// Only this voice is labeled; other voices are skipped
const LABELED_VOICE: &str = "1";

/// Parse a partwise MusicXML document into an event stream.
///
/// The first `<part>` is read; the document is not scanned past it.
pub fn parse_musicxml(xml: &[u8]) -> Result<EventStream> {
    let divisions = scan_divisions(xml)?;
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut builder = StreamBuilder::new(divisions);
    let mut in_part = false;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                b"part" => in_part = true,
                b"measure" if in_part => builder.push(EventKind::MeasureBoundary),
                b"attributes" if in_part => parse_attributes(&mut reader, &mut builder)?,
                b"direction" if in_part => parse_direction(&mut reader, &mut builder)?,
                b"sound" if in_part => parse_sound(e, &mut builder),
                b"note" if in_part => {
                    let note = parse_note(&mut reader)?;
                    builder.add_note(note)?;
                }
                b"forward" if in_part => {
                    let (duration, voice) = parse_forward(&mut reader)?;
                    if voice.as_deref().unwrap_or(LABELED_VOICE) == LABELED_VOICE {
                        builder.elapse(duration)?;
                        builder.push(EventKind::Rest);
                    }
                }
                _ => {}
            },
            Ok(XmlEvent::Empty(ref e)) => {
                if in_part && e.name().as_ref() == b"sound" {
                    parse_sound(e, &mut builder);
                }
            }
            Ok(XmlEvent::End(ref e)) => {
                if e.name().as_ref() == b"part" {
                    break;
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                return Err(SegmentError::Xml(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(builder.finish())
}

/// `<divisions>` values of the first part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Divisions {
    /// Active until the first `<divisions>` element is read
    first: u32,
    /// Least common multiple of every value; the stream resolution
    ticks_per_beat: u32,
}

/// Collect every `<divisions>` in the first part before any event is built,
/// so each duration maps onto a whole number of ticks.
fn scan_divisions(xml: &[u8]) -> Result<Divisions> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut first = None;
    let mut ticks_per_beat = 1u32;
    let mut in_part = false;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                b"part" => in_part = true,
                b"divisions" if in_part => {
                    let divisions: u32 = read_text(&mut reader)?.parse().unwrap_or(0);
                    if divisions == 0 {
                        continue;
                    }
                    first.get_or_insert(divisions);
                    ticks_per_beat = lcm(ticks_per_beat, divisions).ok_or_else(|| {
                        SegmentError::Xml(format!(
                            "divisions {} and {} have no common resolution",
                            ticks_per_beat, divisions
                        ))
                    })?;
                }
                _ => {}
            },
            Ok(XmlEvent::End(ref e)) => {
                if e.name().as_ref() == b"part" {
                    break;
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                return Err(SegmentError::Xml(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(Divisions {
        first: first.unwrap_or(ticks_per_beat),
        ticks_per_beat,
    })
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// `None` when the result does not fit a `u32`
fn lcm(a: u32, b: u32) -> Option<u32> {
    (a / gcd(a, b)).checked_mul(b)
}

/// Accumulates events and the tick delta owed to the next one
#[derive(Debug)]
struct StreamBuilder {
    events: Vec<Event>,
    pending: i64,
    ticks_per_beat: u32,
    /// Currently active `<divisions>`; always divides `ticks_per_beat`
    divisions: u32,
}

impl StreamBuilder {
    fn new(divisions: Divisions) -> Self {
        Self {
            events: Vec::new(),
            pending: 0,
            ticks_per_beat: divisions.ticks_per_beat,
            divisions: divisions.first,
        }
    }

    fn push(&mut self, kind: EventKind) {
        self.events.push(Event::new(self.pending, kind));
        self.pending = 0;
    }

    fn elapse(&mut self, divs: u64) -> Result<()> {
        let scale = (self.ticks_per_beat / self.divisions) as u64;
        self.pending = divs
            .checked_mul(scale)
            .and_then(|ticks| i64::try_from(ticks).ok())
            .and_then(|ticks| self.pending.checked_add(ticks))
            .ok_or_else(|| {
                SegmentError::Xml(format!("duration {} overflows the tick count", divs))
            })?;
        Ok(())
    }

    fn set_divisions(&mut self, divisions: u32) {
        if divisions == 0 || self.ticks_per_beat % divisions != 0 {
            return;
        }
        self.divisions = divisions;
    }

    fn add_note(&mut self, note: NoteInfo) -> Result<()> {
        if note.grace || note.chord {
            log::debug!("skipping {} note", if note.grace { "grace" } else { "chord" });
            return Ok(());
        }
        if note.voice.as_deref().unwrap_or(LABELED_VOICE) != LABELED_VOICE {
            return Ok(());
        }
        if note.rest {
            self.elapse(note.duration)?;
            self.push(EventKind::Rest);
            return Ok(());
        }

        let pitch = pitch_number_from_step(&note.step, note.alter, note.octave)?;
        let (on_tie, off_tie) = match (note.tie_start, note.tie_stop) {
            (false, false) => (TieFlag::None, TieFlag::None),
            (true, false) => (TieFlag::Start, TieFlag::Continue),
            (true, true) => (TieFlag::Continue, TieFlag::Continue),
            (false, true) => (TieFlag::Continue, TieFlag::Stop),
        };
        self.push(EventKind::NoteOn {
            pitch,
            intensity: None,
            tie: on_tie,
        });
        self.elapse(note.duration)?;
        self.push(EventKind::NoteOff { pitch, tie: off_tie });
        Ok(())
    }

    fn finish(self) -> EventStream {
        EventStream::new(self.ticks_per_beat, self.events)
    }
}

#[derive(Debug, Default)]
struct NoteInfo {
    rest: bool,
    chord: bool,
    grace: bool,
    step: String,
    alter: i8,
    octave: i8,
    duration: u64,
    voice: Option<String>,
    tie_start: bool,
    tie_stop: bool,
}

fn parse_note(reader: &mut Reader<&[u8]>) -> Result<NoteInfo> {
    let mut note = NoteInfo {
        octave: 4,
        ..Default::default()
    };

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                b"rest" => note.rest = true,
                b"pitch" => parse_pitch(reader, &mut note)?,
                b"duration" => note.duration = read_text(reader)?.parse().unwrap_or(0),
                b"voice" => note.voice = Some(read_text(reader)?),
                b"tie" => mark_tie(e, &mut note),
                _ => {}
            },
            Ok(XmlEvent::Empty(ref e)) => match e.name().as_ref() {
                b"rest" => note.rest = true,
                b"chord" => note.chord = true,
                b"grace" => note.grace = true,
                b"tie" => mark_tie(e, &mut note),
                _ => {}
            },
            Ok(XmlEvent::End(ref e)) => {
                if e.name().as_ref() == b"note" {
                    break;
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(SegmentError::Xml(format!("Error parsing note: {}", e))),
            _ => {}
        }
    }
    Ok(note)
}

fn mark_tie(e: &BytesStart, note: &mut NoteInfo) {
    match attribute(e, b"type").as_deref() {
        Some("start") => note.tie_start = true,
        Some("stop") => note.tie_stop = true,
        _ => {}
    }
}

fn parse_pitch(reader: &mut Reader<&[u8]>, note: &mut NoteInfo) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                b"step" => note.step = read_text(reader)?,
                b"alter" => {
                    // alter may be fractional for microtones; round to a semitone
                    note.alter = read_text(reader)?
                        .parse::<f32>()
                        .map(|v| v.round() as i8)
                        .unwrap_or(0);
                }
                b"octave" => note.octave = read_text(reader)?.parse().unwrap_or(4),
                _ => {}
            },
            Ok(XmlEvent::End(ref e)) => {
                if e.name().as_ref() == b"pitch" {
                    break;
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(SegmentError::Xml(format!("Error parsing pitch: {}", e))),
            _ => {}
        }
    }
    Ok(())
}

fn parse_forward(reader: &mut Reader<&[u8]>) -> Result<(u64, Option<String>)> {
    let mut duration = 0u64;
    let mut voice = None;
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                b"duration" => duration = read_text(reader)?.parse().unwrap_or(0),
                b"voice" => voice = Some(read_text(reader)?),
                _ => {}
            },
            Ok(XmlEvent::End(ref e)) => {
                if e.name().as_ref() == b"forward" {
                    break;
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(SegmentError::Xml(format!("Error parsing forward: {}", e))),
            _ => {}
        }
    }
    Ok((duration, voice))
}

fn parse_attributes(reader: &mut Reader<&[u8]>, builder: &mut StreamBuilder) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                b"divisions" => {
                    let divisions = read_text(reader)?.parse().unwrap_or(1);
                    builder.set_divisions(divisions);
                }
                b"time" => {
                    let (numerator, denominator) = parse_time_signature(reader)?;
                    builder.push(EventKind::TimeSignatureChange {
                        numerator,
                        denominator,
                    });
                }
                b"key" => {
                    let (fifths, minor) = parse_key(reader)?;
                    builder.push(EventKind::KeySignatureChange { fifths, minor });
                }
                _ => {}
            },
            Ok(XmlEvent::End(ref e)) => {
                if e.name().as_ref() == b"attributes" {
                    break;
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(SegmentError::Xml(format!("Error parsing attributes: {}", e))),
            _ => {}
        }
    }
    Ok(())
}

fn parse_time_signature(reader: &mut Reader<&[u8]>) -> Result<(u32, u32)> {
    let mut numerator = 4u32;
    let mut denominator = 4u32;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                // additive meters ("3+2") count the sum
                b"beats" => {
                    numerator = read_text(reader)?
                        .split('+')
                        .map(|part| part.trim().parse::<u32>().unwrap_or(0))
                        .sum();
                }
                b"beat-type" => denominator = read_text(reader)?.parse().unwrap_or(0),
                _ => {}
            },
            Ok(XmlEvent::End(ref e)) => {
                if e.name().as_ref() == b"time" {
                    break;
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => {
                return Err(SegmentError::Xml(format!(
                    "Error parsing time signature: {}",
                    e
                )))
            }
            _ => {}
        }
    }
    Ok((numerator, denominator))
}

fn parse_key(reader: &mut Reader<&[u8]>) -> Result<(i8, bool)> {
    let mut fifths = 0i8;
    let mut minor = false;
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                b"fifths" => fifths = read_text(reader)?.parse().unwrap_or(0),
                b"mode" => minor = read_text(reader)? == "minor",
                _ => {}
            },
            Ok(XmlEvent::End(ref e)) => {
                if e.name().as_ref() == b"key" {
                    break;
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(SegmentError::Xml(format!("Error parsing key: {}", e))),
            _ => {}
        }
    }
    Ok((fifths, minor))
}

/// `<direction>`: dynamics markings and embedded `<sound>` tempos
fn parse_direction(reader: &mut Reader<&[u8]>, builder: &mut StreamBuilder) -> Result<()> {
    let mut in_dynamics = false;
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                b"dynamics" => in_dynamics = true,
                b"other-dynamics" if in_dynamics => {
                    let level = read_text(reader)?;
                    builder.push(EventKind::DynamicChange { level });
                }
                b"sound" => parse_sound(e, builder),
                _ => {}
            },
            Ok(XmlEvent::Empty(ref e)) => {
                let name = e.name();
                if in_dynamics {
                    let level = String::from_utf8_lossy(name.as_ref()).into_owned();
                    builder.push(EventKind::DynamicChange { level });
                } else if name.as_ref() == b"sound" {
                    parse_sound(e, builder);
                }
            }
            Ok(XmlEvent::End(ref e)) => match e.name().as_ref() {
                b"dynamics" => in_dynamics = false,
                b"direction" => break,
                _ => {}
            },
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(SegmentError::Xml(format!("Error parsing direction: {}", e))),
            _ => {}
        }
    }
    Ok(())
}

/// `<sound tempo="120"/>` in quarter notes per minute
fn parse_sound(e: &BytesStart, builder: &mut StreamBuilder) {
    let bpm = attribute(e, b"tempo").and_then(|s| s.parse::<f64>().ok());
    if let Some(bpm) = bpm.filter(|bpm| *bpm > 0.0) {
        builder.push(EventKind::TempoChange {
            micros_per_quarter: (60_000_000.0 / bpm).round() as u32,
        });
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| String::from_utf8(attr.value.to_vec()).ok())
}

fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    match reader.read_event() {
        Ok(XmlEvent::Text(e)) => e
            .unescape()
            .map(|text| text.into_owned())
            .map_err(|e| SegmentError::Xml(format!("Invalid text: {}", e))),
        Ok(_) => Ok(String::new()),
        Err(e) => Err(SegmentError::Xml(format!("Error reading text: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(measures: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise>
  <part-list>
    <score-part id="P1"><part-name>Clarinet</part-name></score-part>
  </part-list>
  <part id="P1">{}</part>
</score-partwise>"#,
            measures
        )
        .into_bytes()
    }

    fn note_off_deltas(stream: &EventStream) -> Vec<i64> {
        stream
            .events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::NoteOff { .. }))
            .map(|e| e.tick_delta)
            .collect()
    }

    #[test]
    fn test_simple_note() {
        let xml = score(
            r#"<measure number="1">
      <attributes>
        <divisions>4</divisions>
        <time><beats>4</beats><beat-type>4</beat-type></time>
      </attributes>
      <note>
        <pitch><step>C</step><octave>4</octave></pitch>
        <duration>4</duration>
      </note>
    </measure>"#,
        );
        let stream = parse_musicxml(&xml).expect("Failed to parse");
        assert_eq!(stream.ticks_per_beat, 4);
        assert_eq!(
            stream.events,
            vec![
                Event::measure_boundary(0),
                Event::time_signature(0, 4, 4),
                Event::note_on(0, 60, None, TieFlag::None),
                Event::note_off(4, 60, TieFlag::None),
            ]
        );
    }

    #[test]
    fn test_rest_carries_its_duration() {
        let xml = score(
            r#"<measure number="1">
      <attributes><divisions>2</divisions></attributes>
      <note><rest/><duration>3</duration></note>
      <note>
        <pitch><step>D</step><alter>-1</alter><octave>5</octave></pitch>
        <duration>1</duration>
      </note>
    </measure>"#,
        );
        let stream = parse_musicxml(&xml).expect("Failed to parse rest");
        assert_eq!(stream.events[1], Event::rest(3));
        assert_eq!(stream.events[2], Event::note_on(0, 73, None, TieFlag::None));
        assert_eq!(stream.events[3], Event::note_off(1, 73, TieFlag::None));
    }

    #[test]
    fn test_tie_chain_flags() {
        let xml = score(
            r#"<measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>2</duration><tie type="start"/></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration><tie type="stop"/><tie type="start"/></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration><tie type="stop"/></note>
    </measure>"#,
        );
        let stream = parse_musicxml(&xml).unwrap();
        let ties: Vec<TieFlag> = stream
            .events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::NoteOn { tie, .. } | EventKind::NoteOff { tie, .. } => Some(tie),
                _ => None,
            })
            .collect();
        assert_eq!(
            ties,
            vec![
                TieFlag::Start,
                TieFlag::Continue,
                TieFlag::Continue,
                TieFlag::Continue,
                TieFlag::Continue,
                TieFlag::Stop,
            ]
        );
    }

    #[test]
    fn test_dynamics_and_tempo() {
        let xml = score(
            r#"<measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <direction>
        <direction-type><dynamics><mf/></dynamics></direction-type>
        <sound tempo="120"/>
      </direction>
      <note><pitch><step>A</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>"#,
        );
        let stream = parse_musicxml(&xml).unwrap();
        assert!(stream.events.contains(&Event::dynamic(0, "mf")));
        assert!(stream.events.contains(&Event::tempo(0, 500_000)));
    }

    #[test]
    fn test_chords_grace_and_other_voices_skipped() {
        let xml = score(
            r#"<measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note><grace/><pitch><step>B</step><octave>4</octave></pitch></note>
      <note><pitch><step>C</step><octave>5</octave></pitch><duration>1</duration><voice>1</voice></note>
      <note><chord/><pitch><step>E</step><octave>5</octave></pitch><duration>1</duration><voice>1</voice></note>
      <backup><duration>1</duration></backup>
      <note><pitch><step>C</step><octave>3</octave></pitch><duration>1</duration><voice>2</voice></note>
    </measure>"#,
        );
        let stream = parse_musicxml(&xml).unwrap();
        let pitches: Vec<u8> = stream
            .events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::NoteOn { pitch, .. } => Some(pitch),
                _ => None,
            })
            .collect();
        assert_eq!(pitches, vec![72]);
    }

    #[test]
    fn test_only_first_part_is_read() {
        let xml = br#"<score-partwise>
  <part id="P1"><measure number="1"><attributes><divisions>1</divisions></attributes>
    <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note></measure></part>
  <part id="P2"><measure number="1">
    <note><pitch><step>G</step><octave>4</octave></pitch><duration>1</duration></note></measure></part>
</score-partwise>"#;
        let stream = parse_musicxml(xml).unwrap();
        assert_eq!(stream.events.iter().filter(|e| e.is_note()).count(), 2);
    }

    #[test]
    fn test_divisions_change_is_rescaled() {
        let xml = score(
            r#"<measure number="1">
      <attributes><divisions>2</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>2</duration></note>
    </measure>
    <measure number="2">
      <attributes><divisions>4</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note>
    </measure>"#,
        );
        let stream = parse_musicxml(&xml).unwrap();
        assert_eq!(stream.ticks_per_beat, 4);
        assert_eq!(note_off_deltas(&stream), vec![4, 4]);
    }

    #[test]
    fn test_finer_divisions_later_keep_every_note() {
        let xml = score(
            r#"<measure number="1">
      <attributes>
        <divisions>1</divisions>
        <time><beats>4</beats><beat-type>4</beat-type></time>
      </attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note>
    </measure>
    <measure number="2">
      <attributes><divisions>3</divisions></attributes>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration></note>
      <note><pitch><step>F</step><octave>4</octave></pitch><duration>1</duration></note>
      <note><pitch><step>G</step><octave>4</octave></pitch><duration>9</duration></note>
    </measure>"#,
        );
        let stream = parse_musicxml(&xml).unwrap();
        assert_eq!(stream.ticks_per_beat, 3);
        assert_eq!(note_off_deltas(&stream), vec![12, 1, 1, 1, 9]);
    }

    #[test]
    fn test_divisions_lcm() {
        assert_eq!(lcm(4, 6), Some(12));
        assert_eq!(lcm(1, 3), Some(3));
        assert_eq!(lcm(u32::MAX, u32::MAX - 1), None);
    }

    #[test]
    fn test_oversized_duration_is_xml_error() {
        let xml = score(
            r#"<measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>18446744073709551615</duration></note>
    </measure>"#,
        );
        assert!(matches!(parse_musicxml(&xml), Err(SegmentError::Xml(_))));
    }

    #[test]
    fn test_unknown_step_is_pitch_error() {
        let xml = score(
            r#"<measure number="1">
      <note><pitch><step>H</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>"#,
        );
        assert!(matches!(
            parse_musicxml(&xml),
            Err(SegmentError::UnknownPitchName(_))
        ));
    }

    #[test]
    fn test_malformed_xml() {
        let xml = score(r#"<measure number="1"><note></measure>"#);
        assert!(matches!(parse_musicxml(&xml), Err(SegmentError::Xml(_))));
    }
}
