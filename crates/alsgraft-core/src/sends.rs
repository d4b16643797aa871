//! Send-matrix synchronization.
//!
//! Every mixer track carries one send holder per return track, and the
//! document carries one `SendsPre` flag per return track, both index-aligned
//! with return-track position. The functions here restore those invariants
//! around an insertion or deletion of return tracks.
//!
//! Carry-over capture runs against the incoming copies before the
//! destination tree is touched, so an unmapped send-holder reference fails
//! the operation while the destination is still unmodified.

use tracing::debug;

use crate::error::{SetError, SetResult};
use crate::model::{MixerTrack, Send, Sends, SendsPre, sends_of};
use crate::tree::Element;

struct CarriedSend {
    send: Send,
    enabled_by_user: bool,
}

/// Allocates two fresh pointee IDs and inserts a blank send at `index`.
fn add_blank_send(sends: &mut Sends<'_>, index: usize, next_pointee_id: &mut i64) -> SetResult<()> {
    let automation_target_id = *next_pointee_id;
    let modulation_target_id = *next_pointee_id + 1;
    *next_pointee_id += 2;
    sends.insert_send(
        index,
        Send::create(automation_target_id, modulation_target_id),
        false,
    )
}

/// Rebuilds each incoming mixer track's send list for the destination's
/// return-track ordering.
///
/// The origin-relative holders are invalid in the destination, so the list
/// is rebuilt from scratch: one blank holder per destination return track,
/// then the holders carried over from the origin (one per incoming return
/// track, looked up at its origin `send_index`) inserted as a block at
/// `return_index`, preserving their send wiring and enabled flags.
pub(crate) fn rebuild_incoming_sends(
    incoming: &mut [&mut dyn MixerTrack],
    origin_indexes: &[usize],
    destination_return_count: usize,
    return_index: usize,
    next_pointee_id: &mut i64,
) -> SetResult<()> {
    for track in incoming.iter_mut() {
        let track_name = track.effective_name()?;
        let mut sends = sends_of(track.element_mut())?;

        let mut carried: Vec<CarriedSend> = Vec::with_capacity(origin_indexes.len());
        for &origin_index in origin_indexes {
            let holder = sends.holder(origin_index)?.ok_or_else(|| {
                SetError::Reference(format!(
                    "track '{track_name}' has no send holder for return column {origin_index}"
                ))
            })?;
            carried.push(CarriedSend {
                send: holder.send()?,
                enabled_by_user: holder.enabled_by_user()?,
            });
        }

        while !sends.is_empty() {
            sends.delete_send(0)?;
        }
        for _ in 0..destination_return_count {
            add_blank_send(&mut sends, 0, next_pointee_id)?;
        }
        for (offset, entry) in carried.into_iter().enumerate() {
            sends.insert_send(return_index + offset, entry.send, entry.enabled_by_user)?;
        }
    }

    debug!(tracks = incoming.len(), "incoming send lists rebuilt");
    Ok(())
}

/// Inserts one blank send column per incoming return track, starting at
/// `return_index`, into every mixer track currently in the document.
pub(crate) fn insert_blank_columns(
    tracks_element: &mut Element,
    incoming_return_count: usize,
    return_index: usize,
    next_pointee_id: &mut i64,
) -> SetResult<()> {
    for track_element in tracks_element.children_mut() {
        let mut sends = sends_of(track_element)?;
        for offset in 0..incoming_return_count {
            add_blank_send(&mut sends, return_index + offset, next_pointee_id)?;
        }
    }
    Ok(())
}

/// Inserts the incoming return tracks' pre/post flags into `SendsPre`,
/// starting at `return_index`.
pub(crate) fn insert_send_pre_flags(
    sends_pre_element: &mut Element,
    flags: &[bool],
    return_index: usize,
) -> SetResult<()> {
    let mut sends_pre = SendsPre::new(sends_pre_element)?;
    for (offset, &flag) in flags.iter().enumerate() {
        sends_pre.insert_flag(return_index + offset, flag)?;
    }
    Ok(())
}

/// Removes the send column at `index` from every mixer track in the
/// document. The deletion mirror of [`insert_blank_columns`].
pub(crate) fn remove_column(tracks_element: &mut Element, index: usize) -> SetResult<()> {
    for track_element in tracks_element.children_mut() {
        let mut sends = sends_of(track_element)?;
        sends.delete_send(index)?;
    }
    Ok(())
}

/// Removes the pre/post flag at `index` from `SendsPre`.
pub(crate) fn remove_send_pre_flag(sends_pre_element: &mut Element, index: usize) -> SetResult<()> {
    let mut sends_pre = SendsPre::new(sends_pre_element)?;
    sends_pre.delete_flag(index)
}
