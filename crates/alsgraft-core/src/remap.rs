//! Identifier allocation and remapping for incoming track batches.
//!
//! Two independent namespaces: track IDs (scoped to one set) and pointee
//! IDs (a monotonically increasing counter persisted in the document). Both
//! remaps run before anything is spliced into the destination tree, so every
//! fresh ID is strictly greater than any ID already in use there and
//! collisions are structurally impossible.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{SetError, SetResult};
use crate::model::{ID_ATTR, MixerTrack, RoutingKind, VALUE_ATTR, parse_int_attr};
use crate::tree::Element;

// Routing targets look like "AudioIn/Track.14/TrackOut" or
// "MidiIn/Externall.All/-1". The main track's -1 never matches the digit
// pattern, so it is never subject to remap.
static TRACK_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Track\.(\d+)").expect("track reference pattern is valid"));

const POINTEE_REF_TAG: &str = "PointeeId";

/// Assigns fresh sequential IDs to every track in the batch, then rewrites
/// group IDs and routing targets through the resulting old-to-new mapping.
///
/// `existing_ids` are the destination's current mixer-track IDs; allocation
/// starts just above their maximum.
pub(crate) fn remap_track_ids(
    existing_ids: &[i64],
    tracks: &mut [&mut dyn MixerTrack],
) -> SetResult<()> {
    let mut next_id = existing_ids.iter().copied().fold(0, i64::max) + 1;
    let mut replacements: HashMap<i64, i64> = HashMap::new();

    for track in tracks.iter_mut() {
        let old_id = track.id()?;
        replacements.insert(old_id, next_id);
        track.set_id(next_id);
        next_id += 1;
    }

    for track in tracks.iter_mut() {
        let group_id = track.track_group_id()?;
        if group_id >= 0 {
            if track.is_return_track() {
                return Err(SetError::Invariant(format!(
                    "return track '{}' has a group ID",
                    track.effective_name()?
                )));
            }
            let new_group_id = *replacements.get(&group_id).ok_or_else(|| {
                SetError::Reference(format!(
                    "track '{}' is in an unrecognized group ({group_id})",
                    track.effective_name().unwrap_or_default()
                ))
            })?;
            track.set_track_group_id(new_group_id)?;
        }

        rewrite_routing_targets(&mut **track, &replacements)?;
    }

    debug!(tracks = tracks.len(), "track IDs remapped");
    Ok(())
}

fn rewrite_routing_targets(
    track: &mut dyn MixerTrack,
    replacements: &HashMap<i64, i64>,
) -> SetResult<()> {
    let mut chain = track.device_chain()?;
    for kind in RoutingKind::ALL {
        let mut routing = chain.routing(kind)?;
        let target = routing.target()?.to_string();
        let rewritten = rewrite_track_refs(&target, replacements);
        if rewritten != target {
            routing.set_target(&rewritten)?;
        }
    }
    Ok(())
}

/// Substitutes every `Track.<id>` occurrence through the mapping. IDs
/// absent from the mapping reference tracks outside the batch and keep
/// their original value.
fn rewrite_track_refs(target: &str, replacements: &HashMap<i64, i64>) -> String {
    TRACK_REF
        .replace_all(target, |caps: &Captures<'_>| match caps[1].parse::<i64>() {
            Ok(old_id) => match replacements.get(&old_id) {
                Some(new_id) => format!("Track.{new_id}"),
                None => caps[0].to_string(),
            },
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

fn is_pointee_definition(tag: &str) -> bool {
    tag == "AutomationTarget"
        || tag == "Pointee"
        || tag.starts_with("ControllerTargets.")
        || tag.ends_with("ModulationTarget")
}

/// Walks every pointee definition in the batch, assigning it the next
/// counter value, then rewrites every `PointeeId` reference through the
/// resulting mapping. A reference whose old ID was not defined inside the
/// batch is a dangling pointee: the batch must be self-contained.
///
/// The caller persists the updated counter onto the document only after the
/// whole operation succeeds.
pub(crate) fn remap_pointee_ids(
    next_pointee_id: &mut i64,
    elements: &mut [&mut Element],
) -> SetResult<()> {
    let mut replacements: HashMap<i64, i64> = HashMap::new();

    for element in elements.iter_mut() {
        let mut failure: Option<SetError> = None;
        element.visit_mut(&mut |node| {
            if failure.is_some() || !is_pointee_definition(node.tag()) {
                return;
            }
            match node.attr(ID_ATTR) {
                None => {
                    failure = Some(SetError::Schema(format!(
                        "pointee tag '{}' has no ID",
                        node.tag()
                    )));
                }
                Some(_) => match parse_int_attr(node, ID_ATTR) {
                    Err(error) => failure = Some(error),
                    Ok(old_id) => {
                        replacements.insert(old_id, *next_pointee_id);
                        node.set_attr(ID_ATTR, next_pointee_id.to_string());
                        *next_pointee_id += 1;
                    }
                },
            }
        });
        if let Some(error) = failure {
            return Err(error);
        }
    }

    for element in elements.iter_mut() {
        let mut failure: Option<SetError> = None;
        element.visit_mut(&mut |node| {
            if failure.is_some() || node.tag() != POINTEE_REF_TAG {
                return;
            }
            match parse_int_attr(node, VALUE_ATTR) {
                Err(error) => failure = Some(error),
                Ok(old_id) => match replacements.get(&old_id) {
                    Some(new_id) => node.set_attr(VALUE_ATTR, new_id.to_string()),
                    None => {
                        failure = Some(SetError::Reference(format!(
                            "unknown mapping to pointee ID: {old_id}"
                        )));
                    }
                },
            }
        });
        if let Some(error) = failure {
            return Err(error);
        }
    }

    debug!(
        definitions = replacements.len(),
        next_pointee_id = *next_pointee_id,
        "pointee IDs remapped"
    );
    Ok(())
}
