//! The set document and its track composition operations.

use tracing::{debug, info, instrument};

use crate::container;
use crate::error::{SetError, SetResult};
use crate::model::{
    DeviceChain, ID_ATTR, MainTrack, Mixer, MixerTrack, PrimaryTrack, PrimaryTrackKind,
    ReturnTrack, Sends, SendsPre, Track, TrackSendHolder, int_value, parse_int_attr,
    read_send_pre_entries, required_child, required_child_mut, set_int_value,
};
use crate::remap;
use crate::sends;
use crate::tree::Element;

const TRACKS_TAG: &str = "Tracks";
const NEXT_POINTEE_ID_TAG: &str = "NextPointeeId";

/// A batch of tracks to insert, as owned snapshots taken from a source set.
///
/// Primary tracks land at `primary_index` among the primary tracks, return
/// tracks at `return_index` among the return tracks; a supplied main track
/// replaces the destination's main track in place.
#[derive(Debug, Default)]
pub struct TrackInsertion {
    pub primary_tracks: Vec<PrimaryTrack>,
    pub primary_index: usize,
    pub return_tracks: Vec<ReturnTrack>,
    pub return_index: usize,
    pub main_track: Option<MainTrack>,
}

/// One set document: the container root plus the composition operations.
///
/// Mutating operations are not transactional; in practice every
/// input-dependent failure fires before the destination tree is touched,
/// but callers that need atomicity should mutate a clone and swap it in on
/// success.
#[derive(Debug, Clone)]
pub struct LiveSet {
    root: Element,
}

impl LiveSet {
    pub const TAG: &'static str = "LiveSet";

    /// Parses a gzip-compressed set document and validates its structure.
    pub fn from_bytes(bytes: &[u8]) -> SetResult<Self> {
        let root = container::read(bytes)?;
        let set = Self { root };
        set.validate()?;
        debug!(
            primary = set.primary_track_count()?,
            returns = set.return_track_count()?,
            "set document parsed"
        );
        Ok(set)
    }

    /// Serializes to the compressed container format.
    pub fn to_bytes(&self) -> SetResult<Vec<u8>> {
        container::write(&self.root)
    }

    /// Serializes to the uncompressed document bytes (prolog, body, trailing
    /// newline) — the form the round-trip contract is stated over.
    #[must_use]
    pub fn to_xml_bytes(&self) -> Vec<u8> {
        container::write_xml(&self.root)
    }

    // The container guarantees exactly one child under the wrapper root.
    fn element(&self) -> &Element {
        &self.root.children()[0]
    }

    fn element_mut(&mut self) -> &mut Element {
        &mut self.root.children_mut()[0]
    }

    fn tracks_element(&self) -> SetResult<&Element> {
        required_child(self.element(), TRACKS_TAG)
    }

    fn tracks_element_mut(&mut self) -> SetResult<&mut Element> {
        required_child_mut(self.element_mut(), TRACKS_TAG)
    }

    fn sends_pre_element_mut(&mut self) -> SetResult<&mut Element> {
        required_child_mut(self.element_mut(), SendsPre::TAG)
    }

    fn next_pointee_id(&self) -> SetResult<i64> {
        int_value(required_child(self.element(), NEXT_POINTEE_ID_TAG)?)
    }

    fn set_next_pointee_id(&mut self, value: i64) -> SetResult<()> {
        set_int_value(
            required_child_mut(self.element_mut(), NEXT_POINTEE_ID_TAG)?,
            value,
        );
        Ok(())
    }

    pub fn primary_track_count(&self) -> SetResult<usize> {
        Ok(self
            .tracks_element()?
            .children()
            .iter()
            .filter(|child| child.tag() != ReturnTrack::TAG)
            .count())
    }

    pub fn return_track_count(&self) -> SetResult<usize> {
        Ok(self
            .tracks_element()?
            .children()
            .iter()
            .filter(|child| child.tag() == ReturnTrack::TAG)
            .count())
    }

    /// All primary tracks in document order, as owned snapshots.
    pub fn primary_tracks(&self) -> SetResult<Vec<PrimaryTrack>> {
        self.tracks_element()?
            .children()
            .iter()
            .filter(|child| child.tag() != ReturnTrack::TAG)
            .map(|child| PrimaryTrack::from_element(child.clone()))
            .collect()
    }

    /// All return tracks in document order, each bundled with its derived
    /// send-matrix context (column index and pre/post flag).
    pub fn return_tracks(&self) -> SetResult<Vec<ReturnTrack>> {
        let element = self.element();
        let entries = read_send_pre_entries(required_child(element, SendsPre::TAG)?)?;
        required_child(element, TRACKS_TAG)?
            .children()
            .iter()
            .filter(|child| child.tag() == ReturnTrack::TAG)
            .enumerate()
            .map(|(send_index, child)| {
                let (_, send_pre) = entries.get(send_index).copied().ok_or_else(|| {
                    SetError::Invariant(format!(
                        "SendsPre has no entry for return track {send_index}"
                    ))
                })?;
                ReturnTrack::new(child.clone(), send_index, send_pre)
            })
            .collect()
    }

    /// The main track, as an owned snapshot.
    pub fn main_track(&self) -> SetResult<MainTrack> {
        MainTrack::from_element(required_child(self.element(), MainTrack::TAG)?.clone())
    }

    fn mixer_track_ids(&self) -> SetResult<Vec<i64>> {
        self.tracks_element()?
            .children()
            .iter()
            .map(|child| parse_int_attr(child, ID_ATTR))
            .collect()
    }

    /// Inserts a batch of tracks, preserving their internal wiring: track
    /// IDs and pointee IDs are reallocated from this document's namespaces,
    /// group IDs and routing references are rewritten to follow, and the
    /// send matrix and `SendsPre` are resynchronized around the new
    /// return-track ordering.
    #[instrument(skip(self, insertion), fields(
        primary = insertion.primary_tracks.len(),
        returns = insertion.return_tracks.len(),
        main = insertion.main_track.is_some()
    ))]
    pub fn insert_tracks(&mut self, insertion: TrackInsertion) -> SetResult<()> {
        let TrackInsertion {
            mut primary_tracks,
            primary_index,
            mut return_tracks,
            return_index,
            mut main_track,
        } = insertion;

        let primary_count = self.primary_track_count()?;
        let return_count = self.return_track_count()?;
        if primary_index > primary_count {
            return Err(SetError::Range {
                what: "primary tracks",
                index: primary_index,
                len: primary_count,
            });
        }
        if return_index > return_count {
            return Err(SetError::Range {
                what: "return tracks",
                index: return_index,
                len: return_count,
            });
        }

        if primary_tracks.is_empty() && return_tracks.is_empty() && main_track.is_none() {
            debug!("insertion request is empty");
            return Ok(());
        }

        {
            let mut all_tracks: Vec<&dyn Track> = Vec::new();
            for track in &primary_tracks {
                all_tracks.push(track);
            }
            for track in &return_tracks {
                all_tracks.push(track);
            }
            if let Some(main) = &main_track {
                all_tracks.push(main);
            }
            for track in all_tracks {
                if track.linked_track_group_id()? != -1 {
                    return Err(SetError::UnsupportedFeature(format!(
                        "track '{}' belongs to a linked track group",
                        track.effective_name()?
                    )));
                }
            }
        }

        let existing_ids = self.mixer_track_ids()?;
        {
            let mut batch: Vec<&mut dyn MixerTrack> = Vec::new();
            for track in &mut primary_tracks {
                batch.push(track);
            }
            for track in &mut return_tracks {
                batch.push(track);
            }
            remap::remap_track_ids(&existing_ids, &mut batch)?;
        }

        let mut next_pointee_id = self.next_pointee_id()?;
        {
            let mut batch: Vec<&mut Element> = Vec::new();
            for track in &mut primary_tracks {
                batch.push(track.element_mut());
            }
            for track in &mut return_tracks {
                batch.push(track.element_mut());
            }
            if let Some(main) = &mut main_track {
                batch.push(main.element_mut());
            }
            remap::remap_pointee_ids(&mut next_pointee_id, &mut batch)?;
        }

        let origin_indexes: Vec<usize> =
            return_tracks.iter().map(ReturnTrack::send_index).collect();
        let send_pre_flags: Vec<bool> = return_tracks.iter().map(ReturnTrack::send_pre).collect();
        {
            let mut batch: Vec<&mut dyn MixerTrack> = Vec::new();
            for track in &mut primary_tracks {
                batch.push(track);
            }
            for track in &mut return_tracks {
                batch.push(track);
            }
            sends::rebuild_incoming_sends(
                &mut batch,
                &origin_indexes,
                return_count,
                return_index,
                &mut next_pointee_id,
            )?;
        }

        // Everything input-dependent has been validated; the destination is
        // mutated from here on.
        sends::insert_blank_columns(
            self.tracks_element_mut()?,
            return_tracks.len(),
            return_index,
            &mut next_pointee_id,
        )?;
        sends::insert_send_pre_flags(self.sends_pre_element_mut()?, &send_pre_flags, return_index)?;
        self.set_next_pointee_id(next_pointee_id)?;

        let inserted_primary = primary_tracks.len();
        let inserted_returns = return_tracks.len();
        {
            let tracks_element = self.tracks_element_mut()?;
            for (offset, track) in primary_tracks.into_iter().enumerate() {
                tracks_element.insert_child(primary_index + offset, track.into_element());
            }
            // Return tracks always follow all primary tracks.
            let return_element_index = primary_count + inserted_primary + return_index;
            for (offset, track) in return_tracks.into_iter().enumerate() {
                tracks_element.insert_child(return_element_index + offset, track.into_element());
            }
        }

        if let Some(main) = main_track {
            self.replace_main_element(main)?;
        }

        info!(
            primary = inserted_primary,
            returns = inserted_returns,
            "tracks inserted"
        );
        Ok(())
    }

    pub fn insert_primary_tracks(
        &mut self,
        tracks: Vec<PrimaryTrack>,
        index: usize,
    ) -> SetResult<()> {
        self.insert_tracks(TrackInsertion {
            primary_tracks: tracks,
            primary_index: index,
            ..TrackInsertion::default()
        })
    }

    pub fn insert_return_tracks(
        &mut self,
        tracks: Vec<ReturnTrack>,
        index: usize,
    ) -> SetResult<()> {
        self.insert_tracks(TrackInsertion {
            return_tracks: tracks,
            return_index: index,
            ..TrackInsertion::default()
        })
    }

    pub fn replace_main_track(&mut self, main_track: MainTrack) -> SetResult<()> {
        self.insert_tracks(TrackInsertion {
            main_track: Some(main_track),
            ..TrackInsertion::default()
        })
    }

    fn replace_main_element(&mut self, main_track: MainTrack) -> SetResult<()> {
        let element = self.element_mut();
        let position = element
            .children()
            .iter()
            .position(|child| child.tag() == MainTrack::TAG)
            .ok_or_else(|| SetError::Schema("set has no main track".to_string()))?;
        element.children_mut()[position] = main_track.into_element();
        Ok(())
    }

    /// Removes the primary track at `index`. Primary tracks do not
    /// participate in the send matrix, so nothing else changes.
    #[instrument(skip(self))]
    pub fn delete_primary_track(&mut self, index: usize) -> SetResult<()> {
        let primary_count = self.primary_track_count()?;
        if index >= primary_count {
            return Err(SetError::Range {
                what: "primary tracks",
                index,
                len: primary_count,
            });
        }
        // Primary tracks precede return tracks, so the element index is the
        // primary index.
        self.tracks_element_mut()?.remove_child(index);
        info!("primary track deleted");
        Ok(())
    }

    /// Removes the return track at `index`, its send column from every
    /// remaining mixer track, and its `SendsPre` flag.
    #[instrument(skip(self))]
    pub fn delete_return_track(&mut self, index: usize) -> SetResult<()> {
        let primary_count = self.primary_track_count()?;
        let return_count = self.return_track_count()?;
        if index >= return_count {
            return Err(SetError::Range {
                what: "return tracks",
                index,
                len: return_count,
            });
        }
        {
            let tracks_element = self.tracks_element_mut()?;
            tracks_element.remove_child(primary_count + index);
            sends::remove_column(tracks_element, index)?;
        }
        sends::remove_send_pre_flag(self.sends_pre_element_mut()?, index)?;
        info!("return track deleted");
        Ok(())
    }

    fn validate(&self) -> SetResult<()> {
        let element = self.element();
        if element.tag() != Self::TAG {
            return Err(SetError::Format(format!(
                "invalid element tag name: '{}' (expected '{}')",
                element.tag(),
                Self::TAG
            )));
        }

        let tracks = required_child(element, TRACKS_TAG)?;
        let mut seen_return_track = false;
        for child in tracks.children() {
            if child.tag() == ReturnTrack::TAG {
                seen_return_track = true;
                continue;
            }
            if PrimaryTrackKind::from_tag(child.tag()).is_none() {
                return Err(SetError::Schema(format!(
                    "unrecognized track tag: {}",
                    child.tag()
                )));
            }
            if seen_return_track {
                return Err(SetError::Invariant(format!(
                    "set tracks are out of order: {} found after {}",
                    child.tag(),
                    ReturnTrack::TAG
                )));
            }
        }

        required_child(element, MainTrack::TAG)?;
        int_value(required_child(element, NEXT_POINTEE_ID_TAG)?)?;

        // Send-matrix alignment; keeps the engine's positional-ID
        // assertions unreachable from bad input.
        let return_count = tracks
            .children()
            .iter()
            .filter(|child| child.tag() == ReturnTrack::TAG)
            .count();
        let entries = read_send_pre_entries(required_child(element, SendsPre::TAG)?)?;
        if entries.len() != return_count {
            return Err(SetError::Invariant(format!(
                "SendsPre has {} entries for {return_count} return tracks",
                entries.len()
            )));
        }
        for (position, (declared, _)) in entries.iter().enumerate() {
            if *declared != position as i64 {
                return Err(SetError::Invariant(format!(
                    "SendPreBool at position {position} declares ID {declared}"
                )));
            }
        }

        for child in tracks.children() {
            let track_id = parse_int_attr(child, ID_ATTR)?;
            let chain = required_child(child, DeviceChain::TAG)?;
            let mixer = required_child(chain, Mixer::TAG)?;
            let holders = required_child(mixer, Sends::TAG)?.children();
            if holders.len() != return_count {
                return Err(SetError::Invariant(format!(
                    "track {track_id} has {} send holders for {return_count} return tracks",
                    holders.len()
                )));
            }
            for (position, holder) in holders.iter().enumerate() {
                if holder.tag() != TrackSendHolder::TAG {
                    return Err(SetError::Schema(format!(
                        "unexpected child element in send list: {}",
                        holder.tag()
                    )));
                }
                let declared = parse_int_attr(holder, ID_ATTR)?;
                if declared != position as i64 {
                    return Err(SetError::Invariant(format!(
                        "send holder at position {position} declares ID {declared}"
                    )));
                }
            }
        }

        Ok(())
    }
}
