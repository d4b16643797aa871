use std::collections::HashSet;

use alsgraft_core::{
    LiveSet, MixerTrack, ReturnTrack, RoutingKind, SetError, Track, TrackInsertion,
    fixtures::{demo_set, grouped_set},
    tree::{self, Element},
};

fn document_root(set: &LiveSet) -> Element {
    let xml = String::from_utf8(set.to_xml_bytes()).expect("document should be utf-8");
    tree::parse_document(&xml).expect("serialized document should reparse")
}

fn holder_ids(track: &mut dyn MixerTrack) -> Vec<i64> {
    let mut chain = track
        .device_chain()
        .expect("track should have a device chain");
    let mut mixer = chain.mixer().expect("device chain should have a mixer");
    let sends = mixer.sends().expect("mixer should have sends");
    (0..sends.len())
        .map(|index| {
            sends
                .holder(index)
                .expect("holder should be readable")
                .expect("holder should exist")
                .id()
                .expect("holder should have an ID")
        })
        .collect()
}

fn send_column_ids(set: &LiveSet) -> Vec<Vec<i64>> {
    let mut columns = Vec::new();
    for mut track in set.primary_tracks().expect("primary tracks should enumerate") {
        columns.push(holder_ids(&mut track));
    }
    for mut track in set.return_tracks().expect("return tracks should enumerate") {
        columns.push(holder_ids(&mut track));
    }
    columns
}

fn mixer_track_ids(set: &LiveSet) -> Vec<i64> {
    let mut ids = Vec::new();
    for track in set.primary_tracks().expect("primary tracks should enumerate") {
        ids.push(track.id().expect("primary track should have an ID"));
    }
    for track in set.return_tracks().expect("return tracks should enumerate") {
        ids.push(track.id().expect("return track should have an ID"));
    }
    ids
}

fn sends_pre_len(set: &LiveSet) -> usize {
    document_root(set)
        .descendants()
        .filter(|node| node.tag() == "SendPreBool")
        .count()
}

fn is_pointee_definition(tag: &str) -> bool {
    tag == "AutomationTarget"
        || tag == "Pointee"
        || tag.starts_with("ControllerTargets.")
        || tag.ends_with("ModulationTarget")
}

fn assert_pointee_closure(set: &LiveSet) {
    let root = document_root(set);
    let mut definitions = Vec::new();
    let mut references = Vec::new();
    for node in root.descendants() {
        if is_pointee_definition(node.tag()) {
            let id: i64 = node
                .attr("Id")
                .expect("pointee definition should carry an ID")
                .parse()
                .expect("pointee ID should be an integer");
            definitions.push(id);
        } else if node.tag() == "PointeeId" {
            let id: i64 = node
                .attr("Value")
                .expect("pointee reference should carry a value")
                .parse()
                .expect("pointee reference should be an integer");
            references.push(id);
        }
    }

    let unique: HashSet<i64> = definitions.iter().copied().collect();
    assert_eq!(
        unique.len(),
        definitions.len(),
        "pointee IDs should be pairwise unique"
    );
    for reference in &references {
        assert!(
            unique.contains(reference),
            "pointee reference {reference} should resolve within the document"
        );
    }

    let next: i64 = root
        .descendants()
        .find(|node| node.tag() == "NextPointeeId")
        .expect("document should carry NextPointeeId")
        .attr("Value")
        .expect("NextPointeeId should carry a value")
        .parse()
        .expect("NextPointeeId should be an integer");
    let max = definitions
        .iter()
        .copied()
        .max()
        .expect("document should contain pointee definitions");
    assert!(next > max, "NextPointeeId {next} should exceed {max}");
}

#[test]
fn inserting_a_return_track_grows_every_send_list() {
    let source = demo_set();
    let mut target = demo_set();

    let incoming = source
        .return_tracks()
        .expect("source return tracks should enumerate");
    target
        .insert_return_tracks(incoming, 0)
        .expect("insertion should succeed");

    assert_eq!(
        target
            .return_track_count()
            .expect("return tracks should count"),
        2
    );
    let returns = target
        .return_tracks()
        .expect("target return tracks should enumerate");
    assert_eq!(returns[0].id().expect("new return should have an ID"), 4);
    assert_eq!(returns[1].id().expect("old return should keep its ID"), 3);
    assert_eq!(returns[0].send_index(), 0);
    assert_eq!(returns[1].send_index(), 1);

    assert_eq!(sends_pre_len(&target), 2);
    for ids in send_column_ids(&target) {
        assert_eq!(ids, vec![0, 1]);
    }
    assert_pointee_closure(&target);
}

#[test]
fn carried_send_wiring_survives_insertion() {
    let source = demo_set();
    let mut target = demo_set();

    let mut incoming = source
        .return_tracks()
        .expect("source return tracks should enumerate")
        .swap_remove(0);
    {
        let element = incoming.element_mut();
        let sends = element
            .child_mut("DeviceChain")
            .and_then(|chain| chain.child_mut("Mixer"))
            .and_then(|mixer| mixer.child_mut("Sends"))
            .expect("return track should have a send list");
        let holder = &mut sends.children_mut()[0];
        holder
            .child_mut("EnabledByUser")
            .expect("holder should have an enabled flag")
            .set_attr("Value", "true");
        holder
            .child_mut("Send")
            .and_then(|send| send.child_mut("Manual"))
            .expect("holder should have a manual value")
            .set_attr("Value", "0.5");
    }

    target
        .insert_return_tracks(vec![incoming], 0)
        .expect("insertion should succeed");

    let mut new_return = target
        .return_tracks()
        .expect("target return tracks should enumerate")
        .swap_remove(0);
    let mut chain = new_return
        .device_chain()
        .expect("return track should have a device chain");
    let mut mixer = chain.mixer().expect("device chain should have a mixer");
    let sends = mixer.sends().expect("mixer should have sends");

    let carried = sends
        .holder(0)
        .expect("carried holder should be readable")
        .expect("carried holder should exist");
    assert!(
        carried
            .enabled_by_user()
            .expect("carried holder should have an enabled flag")
    );
    let carried_send = carried.send().expect("carried holder should hold a send");
    assert!((carried_send.value().expect("send level should parse") - 0.5).abs() < 1e-9);
    let (range_min, range_max) = carried_send
        .controller_range()
        .expect("send should carry a controller range");
    assert!(range_min > 0.0 && range_min < 1e-3);
    assert!((range_max - 1.0).abs() < f64::EPSILON);

    let blank = sends
        .holder(1)
        .expect("blank holder should be readable")
        .expect("blank holder should exist");
    assert!(
        !blank
            .enabled_by_user()
            .expect("blank holder should have an enabled flag")
    );
    let blank_value = blank
        .send()
        .expect("blank holder should hold a send")
        .value()
        .expect("blank send level should parse");
    assert!((blank_value - 0.000_316_227_757_1).abs() < 1e-12);
}

#[test]
fn inserted_return_tracks_keep_their_pre_fader_flag() {
    let source = grouped_set();
    let mut target = demo_set();

    target
        .insert_return_tracks(
            source
                .return_tracks()
                .expect("source return tracks should enumerate"),
            0,
        )
        .expect("insertion should succeed");

    let returns = target
        .return_tracks()
        .expect("target return tracks should enumerate");
    assert!(returns[0].send_pre(), "inserted return should stay pre-fader");
    assert!(!returns[1].send_pre(), "existing return should stay post-fader");
}

#[test]
fn batch_insertion_keeps_ids_unique_and_tracks_ordered() {
    let source = demo_set();
    let mut target = demo_set();

    target
        .insert_tracks(TrackInsertion {
            primary_tracks: source
                .primary_tracks()
                .expect("source primary tracks should enumerate"),
            primary_index: 0,
            return_tracks: source
                .return_tracks()
                .expect("source return tracks should enumerate"),
            return_index: 0,
            main_track: None,
        })
        .expect("batch insertion should succeed");

    let ids = mixer_track_ids(&target);
    let unique: HashSet<i64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len(), "track IDs should be unique: {ids:?}");

    // No primary track may follow a return track in document order.
    let root = document_root(&target);
    let tracks = root
        .descendants()
        .find(|node| node.tag() == "Tracks")
        .expect("document should have a Tracks element");
    let tags: Vec<&str> = tracks.children().iter().map(Element::tag).collect();
    let first_return = tags
        .iter()
        .position(|tag| *tag == "ReturnTrack")
        .expect("document should have return tracks");
    assert!(
        tags[first_return..].iter().all(|tag| *tag == "ReturnTrack"),
        "tracks are out of order: {tags:?}"
    );

    // The inserted copy of "Bass" listened to the inserted copy of "Lead";
    // its routing must follow the remapped ID.
    let mut inserted_bass = target
        .primary_tracks()
        .expect("target primary tracks should enumerate")
        .swap_remove(1);
    assert_eq!(
        inserted_bass
            .effective_name()
            .expect("track should have a name"),
        "Bass"
    );
    let mut chain = inserted_bass
        .device_chain()
        .expect("track should have a device chain");
    let routing = chain
        .routing(RoutingKind::AudioInput)
        .expect("track should have an audio input routing");
    assert_eq!(
        routing.target().expect("routing should have a target"),
        "AudioIn/Track.4/TrackOut"
    );

    assert_pointee_closure(&target);
}

#[test]
fn group_members_follow_their_group_to_its_new_id() {
    let source = grouped_set();
    let mut target = demo_set();

    target
        .insert_primary_tracks(
            source
                .primary_tracks()
                .expect("source primary tracks should enumerate"),
            0,
        )
        .expect("group insertion should succeed");

    let primaries = target
        .primary_tracks()
        .expect("target primary tracks should enumerate");
    assert_eq!(primaries[0].id().expect("group should have an ID"), 4);
    assert_eq!(primaries[1].id().expect("member should have an ID"), 5);
    assert_eq!(
        primaries[1]
            .track_group_id()
            .expect("member should have a group ID"),
        4
    );

    let mut member = primaries.into_iter().nth(1).expect("member should exist");
    let mut chain = member
        .device_chain()
        .expect("member should have a device chain");
    let routing = chain
        .routing(RoutingKind::AudioOutput)
        .expect("member should have an audio output routing");
    assert_eq!(
        routing.target().expect("routing should have a target"),
        "AudioOut/Track.4/TrackIn"
    );
    assert_eq!(
        routing
            .upper_display_string()
            .expect("routing should have a display string"),
        ""
    );
}

#[test]
fn source_set_is_left_untouched_by_insertion() {
    let source = demo_set();
    let before = source.to_xml_bytes();

    let mut target = demo_set();
    target
        .insert_tracks(TrackInsertion {
            primary_tracks: source
                .primary_tracks()
                .expect("source primary tracks should enumerate"),
            primary_index: 1,
            return_tracks: source
                .return_tracks()
                .expect("source return tracks should enumerate"),
            return_index: 1,
            main_track: Some(source.main_track().expect("source should have a main track")),
        })
        .expect("insertion should succeed");

    assert_eq!(source.to_xml_bytes(), before);
}

#[test]
fn replacing_the_main_track_remaps_its_pointees() {
    let source = grouped_set();
    let mut target = demo_set();

    target
        .replace_main_track(source.main_track().expect("source should have a main track"))
        .expect("main track replacement should succeed");

    let root = document_root(&target);
    let main = root
        .descendants()
        .find(|node| node.tag() == "MainTrack")
        .expect("document should have a main track");
    let volume_target = main
        .descendants()
        .find(|node| node.tag() == "AutomationTarget")
        .expect("main track should have a volume automation target");
    assert_eq!(volume_target.attr("Id"), Some("20"));

    let next = root
        .descendants()
        .find(|node| node.tag() == "NextPointeeId")
        .expect("document should carry NextPointeeId");
    assert_eq!(next.attr("Value"), Some("21"));
}

#[test]
fn snapshot_of_a_set_can_be_reinserted_into_it() {
    let mut set = demo_set();
    let snapshot = set
        .primary_tracks()
        .expect("primary tracks should enumerate")
        .into_iter()
        .next()
        .expect("set should have a primary track");

    set.insert_primary_tracks(vec![snapshot], 0)
        .expect("reinsertion should succeed");

    assert_eq!(
        set.primary_track_count()
            .expect("primary tracks should count"),
        3
    );
    let ids = mixer_track_ids(&set);
    let unique: HashSet<i64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len(), "track IDs should be unique: {ids:?}");
    assert_pointee_closure(&set);
}

#[test]
fn empty_insertion_request_changes_nothing() {
    let mut set = demo_set();
    let before = set.to_xml_bytes();
    set.insert_tracks(TrackInsertion::default())
        .expect("empty insertion should succeed");
    assert_eq!(set.to_xml_bytes(), before);
}

#[test]
fn out_of_range_indices_fail_before_any_mutation() {
    let mut target = demo_set();
    let before = target.to_xml_bytes();

    let error = target
        .insert_primary_tracks(Vec::new(), 3)
        .expect_err("primary index past the end should fail");
    assert!(matches!(
        error,
        SetError::Range {
            index: 3,
            len: 2,
            ..
        }
    ));

    let error = target
        .insert_return_tracks(Vec::new(), 2)
        .expect_err("return index past the end should fail");
    assert!(matches!(
        error,
        SetError::Range {
            index: 2,
            len: 1,
            ..
        }
    ));

    assert_eq!(target.to_xml_bytes(), before);
}

#[test]
fn dangling_pointee_reference_is_rejected() {
    let source = demo_set();
    let mut target = demo_set();
    let before = target.to_xml_bytes();

    let mut track = source
        .primary_tracks()
        .expect("source primary tracks should enumerate")
        .into_iter()
        .next()
        .expect("source should have a primary track");
    track.element_mut().visit_mut(&mut |node| {
        if node.tag() == "PointeeId" {
            node.set_attr("Value", "999");
        }
    });

    let error = target
        .insert_primary_tracks(vec![track], 0)
        .expect_err("dangling pointee should fail");
    assert!(matches!(error, SetError::Reference(_)));
    assert_eq!(target.to_xml_bytes(), before);
}

#[test]
fn return_track_with_a_group_id_is_rejected() {
    let source = demo_set();
    let mut target = demo_set();

    let mut track = source
        .return_tracks()
        .expect("source return tracks should enumerate")
        .swap_remove(0);
    track
        .element_mut()
        .child_mut("TrackGroupId")
        .expect("return track should have a TrackGroupId")
        .set_attr("Value", "1");

    let error = target
        .insert_return_tracks(vec![track], 0)
        .expect_err("grouped return track should fail");
    assert!(matches!(error, SetError::Invariant(_)));
}

#[test]
fn group_member_without_its_group_is_rejected() {
    let source = grouped_set();
    let mut target = demo_set();

    let member = source
        .primary_tracks()
        .expect("source primary tracks should enumerate")
        .swap_remove(1);
    let error = target
        .insert_primary_tracks(vec![member], 0)
        .expect_err("orphaned group member should fail");
    assert!(matches!(error, SetError::Reference(_)));
}

#[test]
fn linked_track_groups_are_rejected() {
    let source = demo_set();
    let mut target = demo_set();

    let mut track = source
        .primary_tracks()
        .expect("source primary tracks should enumerate")
        .into_iter()
        .next()
        .expect("source should have a primary track");
    track
        .element_mut()
        .child_mut("LinkedTrackGroupId")
        .expect("track should have a LinkedTrackGroupId")
        .set_attr("Value", "9");

    let error = target
        .insert_primary_tracks(vec![track], 0)
        .expect_err("linked track group should fail");
    assert!(matches!(error, SetError::UnsupportedFeature(_)));
}

#[test]
fn unmapped_send_holder_reference_is_rejected() {
    let source = demo_set();
    let mut target = demo_set();
    let before = target.to_xml_bytes();

    let element = source
        .return_tracks()
        .expect("source return tracks should enumerate")
        .swap_remove(0)
        .element()
        .clone();
    let track = ReturnTrack::new(element, 7, false).expect("snapshot should construct");

    let error = target
        .insert_return_tracks(vec![track], 0)
        .expect_err("out-of-range origin column should fail");
    assert!(matches!(error, SetError::Reference(_)));
    assert_eq!(target.to_xml_bytes(), before);
}
