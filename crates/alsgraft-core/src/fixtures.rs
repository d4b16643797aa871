//! Deterministic in-memory set documents for tests and examples.
//!
//! The fixture XML is written in the set format's native formatting (tab
//! indentation, self-closed leaf elements), so serializing an unmodified
//! fixture reproduces it byte for byte.

use std::fmt::Write as _;
use std::io::Write as _;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::set::LiveSet;

struct TrackFixture<'a> {
    tag: &'a str,
    id: i64,
    name: &'a str,
    track_group_id: i64,
    audio_in: &'a str,
    audio_out: &'a str,
    midi_in: &'a str,
    midi_out: &'a str,
    volume_target: i64,
    envelope_ref: Option<i64>,
    send_targets: &'a [(i64, i64)],
}

/// A set with two primary tracks (IDs 1 and 2), one return track (ID 3),
/// and a main track. Track 2 listens to track 1's output, track 1 carries
/// a volume automation envelope, and every mixer track has one send column.
#[must_use]
pub fn demo_set() -> LiveSet {
    LiveSet::from_bytes(&demo_set_bytes()).expect("demo set fixture should be valid")
}

#[must_use]
pub fn demo_set_bytes() -> Vec<u8> {
    gzip(&demo_set_xml())
}

#[must_use]
pub fn demo_set_xml() -> String {
    set_xml(
        &[
            TrackFixture {
                tag: "MidiTrack",
                id: 1,
                name: "Lead",
                track_group_id: -1,
                audio_in: "AudioIn/External/S0",
                audio_out: "AudioOut/Main",
                midi_in: "MidiIn/External.All/-1",
                midi_out: "MidiOut/None",
                volume_target: 10,
                envelope_ref: Some(10),
                send_targets: &[(11, 12)],
            },
            TrackFixture {
                tag: "AudioTrack",
                id: 2,
                name: "Bass",
                track_group_id: -1,
                audio_in: "AudioIn/Track.1/TrackOut",
                audio_out: "AudioOut/Main",
                midi_in: "MidiIn/None",
                midi_out: "MidiOut/None",
                volume_target: 13,
                envelope_ref: None,
                send_targets: &[(14, 15)],
            },
            TrackFixture {
                tag: "ReturnTrack",
                id: 3,
                name: "A-Reverb",
                track_group_id: -1,
                audio_in: "AudioIn/None",
                audio_out: "AudioOut/Main",
                midi_in: "MidiIn/None",
                midi_out: "MidiOut/None",
                volume_target: 16,
                envelope_ref: None,
                send_targets: &[(17, 18)],
            },
        ],
        &[false],
        19,
        20,
    )
}

/// A set whose first primary track is a group (ID 1) enclosing the second
/// (ID 2, `TrackGroupId` 1, routed into the group), plus one return track
/// and a main track.
#[must_use]
pub fn grouped_set() -> LiveSet {
    LiveSet::from_bytes(&gzip(&set_xml(
        &[
            TrackFixture {
                tag: "GroupTrack",
                id: 1,
                name: "Drums",
                track_group_id: -1,
                audio_in: "AudioIn/None",
                audio_out: "AudioOut/Main",
                midi_in: "MidiIn/None",
                midi_out: "MidiOut/None",
                volume_target: 10,
                envelope_ref: None,
                send_targets: &[(11, 12)],
            },
            TrackFixture {
                tag: "MidiTrack",
                id: 2,
                name: "Keys",
                track_group_id: 1,
                audio_in: "AudioIn/None",
                audio_out: "AudioOut/Track.1/TrackIn",
                midi_in: "MidiIn/External.All/-1",
                midi_out: "MidiOut/None",
                volume_target: 13,
                envelope_ref: None,
                send_targets: &[(14, 15)],
            },
            TrackFixture {
                tag: "ReturnTrack",
                id: 3,
                name: "B-Delay",
                track_group_id: -1,
                audio_in: "AudioIn/None",
                audio_out: "AudioOut/Main",
                midi_in: "MidiIn/None",
                midi_out: "MidiOut/None",
                volume_target: 16,
                envelope_ref: None,
                send_targets: &[(17, 18)],
            },
        ],
        &[true],
        19,
        20,
    )))
    .expect("grouped set fixture should be valid")
}

fn gzip(xml: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(xml.as_bytes())
        .expect("gzip write to memory should succeed");
    encoder.finish().expect("gzip finish should succeed")
}

fn set_xml(
    tracks: &[TrackFixture<'_>],
    sends_pre: &[bool],
    main_volume_target: i64,
    next_pointee_id: i64,
) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(
        "<Ableton MajorVersion=\"5\" MinorVersion=\"12.0_12049\" SchemaChangeCount=\"7\" \
         Creator=\"Ableton Live 12.0\" Revision=\"5094b92fa547974769f44cf233f1474777d9b3c0\">\n",
    );
    xml.push_str("\t<LiveSet>\n");
    let _ = writeln!(xml, "\t\t<NextPointeeId Value=\"{next_pointee_id}\" />");
    xml.push_str("\t\t<Tracks>\n");
    for track in tracks {
        mixer_track_xml(&mut xml, track);
    }
    xml.push_str("\t\t</Tracks>\n");
    main_track_xml(&mut xml, main_volume_target);
    xml.push_str("\t\t<SendsPre>\n");
    for (index, pre) in sends_pre.iter().enumerate() {
        let _ = writeln!(xml, "\t\t\t<SendPreBool Id=\"{index}\" Value=\"{pre}\" />");
    }
    xml.push_str("\t\t</SendsPre>\n");
    xml.push_str("\t</LiveSet>\n");
    xml.push_str("</Ableton>\n");
    xml
}

fn mixer_track_xml(xml: &mut String, track: &TrackFixture<'_>) {
    let _ = writeln!(xml, "\t\t\t<{} Id=\"{}\">", track.tag, track.id);
    name_xml(xml, "\t\t\t\t", track.name);
    let _ = writeln!(xml, "\t\t\t\t<TrackGroupId Value=\"{}\" />", track.track_group_id);
    xml.push_str("\t\t\t\t<LinkedTrackGroupId Value=\"-1\" />\n");
    if let Some(pointee_ref) = track.envelope_ref {
        envelopes_xml(xml, "\t\t\t\t", pointee_ref);
    }
    xml.push_str("\t\t\t\t<DeviceChain>\n");
    routing_xml(xml, "\t\t\t\t\t", "AudioInputRouting", track.audio_in);
    routing_xml(xml, "\t\t\t\t\t", "AudioOutputRouting", track.audio_out);
    routing_xml(xml, "\t\t\t\t\t", "MidiInputRouting", track.midi_in);
    routing_xml(xml, "\t\t\t\t\t", "MidiOutputRouting", track.midi_out);
    xml.push_str("\t\t\t\t\t<Mixer>\n");
    volume_xml(xml, "\t\t\t\t\t\t", track.volume_target);
    xml.push_str("\t\t\t\t\t\t<Sends>\n");
    for (holder_id, (automation_id, modulation_id)) in track.send_targets.iter().enumerate() {
        send_holder_xml(xml, "\t\t\t\t\t\t\t", holder_id, *automation_id, *modulation_id);
    }
    xml.push_str("\t\t\t\t\t\t</Sends>\n");
    xml.push_str("\t\t\t\t\t</Mixer>\n");
    xml.push_str("\t\t\t\t</DeviceChain>\n");
    let _ = writeln!(xml, "\t\t\t</{}>", track.tag);
}

fn main_track_xml(xml: &mut String, volume_target: i64) {
    xml.push_str("\t\t<MainTrack>\n");
    name_xml(xml, "\t\t\t", "Main");
    xml.push_str("\t\t\t<TrackGroupId Value=\"-1\" />\n");
    xml.push_str("\t\t\t<LinkedTrackGroupId Value=\"-1\" />\n");
    xml.push_str("\t\t\t<DeviceChain>\n");
    routing_xml(xml, "\t\t\t\t", "AudioInputRouting", "AudioIn/None");
    routing_xml(xml, "\t\t\t\t", "AudioOutputRouting", "AudioOut/External/S0");
    routing_xml(xml, "\t\t\t\t", "MidiInputRouting", "MidiIn/None");
    routing_xml(xml, "\t\t\t\t", "MidiOutputRouting", "MidiOut/None");
    xml.push_str("\t\t\t\t<Mixer>\n");
    volume_xml(xml, "\t\t\t\t\t", volume_target);
    xml.push_str("\t\t\t\t</Mixer>\n");
    xml.push_str("\t\t\t</DeviceChain>\n");
    xml.push_str("\t\t</MainTrack>\n");
}

fn name_xml(xml: &mut String, indent: &str, name: &str) {
    let _ = writeln!(xml, "{indent}<Name>");
    let _ = writeln!(xml, "{indent}\t<EffectiveName Value=\"{name}\" />");
    let _ = writeln!(xml, "{indent}\t<UserName Value=\"\" />");
    let _ = writeln!(xml, "{indent}</Name>");
}

fn envelopes_xml(xml: &mut String, indent: &str, pointee_ref: i64) {
    let _ = writeln!(xml, "{indent}<AutomationEnvelopes>");
    let _ = writeln!(xml, "{indent}\t<Envelopes>");
    let _ = writeln!(xml, "{indent}\t\t<AutomationEnvelope Id=\"0\">");
    let _ = writeln!(xml, "{indent}\t\t\t<EnvelopeTarget>");
    let _ = writeln!(xml, "{indent}\t\t\t\t<PointeeId Value=\"{pointee_ref}\" />");
    let _ = writeln!(xml, "{indent}\t\t\t</EnvelopeTarget>");
    let _ = writeln!(xml, "{indent}\t\t</AutomationEnvelope>");
    let _ = writeln!(xml, "{indent}\t</Envelopes>");
    let _ = writeln!(xml, "{indent}</AutomationEnvelopes>");
}

fn routing_xml(xml: &mut String, indent: &str, tag: &str, target: &str) {
    let _ = writeln!(xml, "{indent}<{tag}>");
    let _ = writeln!(xml, "{indent}\t<Target Value=\"{target}\" />");
    let _ = writeln!(xml, "{indent}\t<UpperDisplayString Value=\"\" />");
    let _ = writeln!(xml, "{indent}\t<LowerDisplayString Value=\"\" />");
    let _ = writeln!(xml, "{indent}</{tag}>");
}

fn volume_xml(xml: &mut String, indent: &str, target_id: i64) {
    let _ = writeln!(xml, "{indent}<Volume>");
    let _ = writeln!(xml, "{indent}\t<Manual Value=\"0.794328\" />");
    let _ = writeln!(xml, "{indent}\t<AutomationTarget Id=\"{target_id}\">");
    let _ = writeln!(xml, "{indent}\t\t<LockEnvelope Value=\"0\" />");
    let _ = writeln!(xml, "{indent}\t</AutomationTarget>");
    let _ = writeln!(xml, "{indent}</Volume>");
}

fn send_holder_xml(
    xml: &mut String,
    indent: &str,
    holder_id: usize,
    automation_id: i64,
    modulation_id: i64,
) {
    let _ = writeln!(xml, "{indent}<TrackSendHolder Id=\"{holder_id}\">");
    let _ = writeln!(xml, "{indent}\t<Send>");
    let _ = writeln!(xml, "{indent}\t\t<LomId Value=\"0\" />");
    let _ = writeln!(xml, "{indent}\t\t<Manual Value=\"0.0003162277571\" />");
    let _ = writeln!(xml, "{indent}\t\t<MidiControllerRange>");
    let _ = writeln!(xml, "{indent}\t\t\t<Min Value=\"0.0003162277571\" />");
    let _ = writeln!(xml, "{indent}\t\t\t<Max Value=\"1\" />");
    let _ = writeln!(xml, "{indent}\t\t</MidiControllerRange>");
    let _ = writeln!(xml, "{indent}\t\t<AutomationTarget Id=\"{automation_id}\">");
    let _ = writeln!(xml, "{indent}\t\t\t<LockEnvelope Value=\"0\" />");
    let _ = writeln!(xml, "{indent}\t\t</AutomationTarget>");
    let _ = writeln!(xml, "{indent}\t\t<ModulationTarget Id=\"{modulation_id}\">");
    let _ = writeln!(xml, "{indent}\t\t\t<LockEnvelope Value=\"0\" />");
    let _ = writeln!(xml, "{indent}\t\t</ModulationTarget>");
    let _ = writeln!(xml, "{indent}\t</Send>");
    let _ = writeln!(xml, "{indent}\t<EnabledByUser Value=\"false\" />");
    let _ = writeln!(xml, "{indent}</TrackSendHolder>");
}
