//! Typed views over set document nodes: tracks, device chains, routings,
//! the send matrix, and the `SendsPre` array.
//!
//! Views are tag-checked at construction. Track values returned by
//! enumeration are owned snapshots detached from the set they came from;
//! sub-views (`DeviceChain`, `Mixer`, `Sends`, ...) borrow into a track or
//! document element and mutate it in place.

use crate::error::{SetError, SetResult};
use crate::tree::Element;

pub(crate) const ID_ATTR: &str = "Id";
pub(crate) const VALUE_ATTR: &str = "Value";

pub(crate) const NAME_TAG: &str = "Name";
pub(crate) const EFFECTIVE_NAME_TAG: &str = "EffectiveName";
pub(crate) const USER_NAME_TAG: &str = "UserName";
pub(crate) const TRACK_GROUP_ID_TAG: &str = "TrackGroupId";
pub(crate) const LINKED_TRACK_GROUP_ID_TAG: &str = "LinkedTrackGroupId";

pub(crate) fn required_child<'a>(element: &'a Element, tag: &str) -> SetResult<&'a Element> {
    element
        .child(tag)
        .ok_or_else(|| SetError::Schema(format!("<{}> has no <{tag}> child", element.tag())))
}

pub(crate) fn required_child_mut<'a>(
    element: &'a mut Element,
    tag: &str,
) -> SetResult<&'a mut Element> {
    let parent_tag = element.tag().to_string();
    element
        .child_mut(tag)
        .ok_or_else(move || SetError::Schema(format!("<{parent_tag}> has no <{tag}> child")))
}

pub(crate) fn str_attr<'a>(element: &'a Element, name: &str) -> SetResult<&'a str> {
    element.attr(name).ok_or_else(|| {
        SetError::Schema(format!("<{}> has no '{name}' attribute", element.tag()))
    })
}

pub(crate) fn parse_int_attr(element: &Element, name: &str) -> SetResult<i64> {
    let raw = str_attr(element, name)?;
    raw.parse().map_err(|_| {
        SetError::Schema(format!(
            "<{}> {name}=\"{raw}\" is not an integer",
            element.tag()
        ))
    })
}

pub(crate) fn parse_bool_attr(element: &Element, name: &str) -> SetResult<bool> {
    match str_attr(element, name)? {
        "true" => Ok(true),
        "false" => Ok(false),
        raw => Err(SetError::Schema(format!(
            "<{}> {name}=\"{raw}\" is not a boolean",
            element.tag()
        ))),
    }
}

pub(crate) fn parse_float_attr(element: &Element, name: &str) -> SetResult<f64> {
    let raw = str_attr(element, name)?;
    raw.parse().map_err(|_| {
        SetError::Schema(format!("<{}> {name}=\"{raw}\" is not a number", element.tag()))
    })
}

pub(crate) fn int_value(element: &Element) -> SetResult<i64> {
    parse_int_attr(element, VALUE_ATTR)
}

pub(crate) fn set_int_value(element: &mut Element, value: i64) {
    element.set_attr(VALUE_ATTR, value.to_string());
}

pub(crate) fn bool_value(element: &Element) -> SetResult<bool> {
    parse_bool_attr(element, VALUE_ATTR)
}

pub(crate) fn str_value(element: &Element) -> SetResult<&str> {
    str_attr(element, VALUE_ATTR)
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Base capability set shared by every track variant.
pub trait Track {
    fn element(&self) -> &Element;
    fn element_mut(&mut self) -> &mut Element;

    fn effective_name(&self) -> SetResult<String> {
        let name = required_child(self.element(), NAME_TAG)?;
        Ok(str_value(required_child(name, EFFECTIVE_NAME_TAG)?)?.to_string())
    }

    fn user_name(&self) -> SetResult<String> {
        let name = required_child(self.element(), NAME_TAG)?;
        Ok(str_value(required_child(name, USER_NAME_TAG)?)?.to_string())
    }

    fn linked_track_group_id(&self) -> SetResult<i64> {
        int_value(required_child(self.element(), LINKED_TRACK_GROUP_ID_TAG)?)
    }

    fn device_chain(&mut self) -> SetResult<DeviceChain<'_>> {
        DeviceChain::new(required_child_mut(self.element_mut(), DeviceChain::TAG)?)
    }
}

/// Capabilities of tracks that participate in the send matrix.
pub trait MixerTrack: Track {
    fn id(&self) -> SetResult<i64> {
        parse_int_attr(self.element(), ID_ATTR)
    }

    fn set_id(&mut self, id: i64) {
        self.element_mut().set_attr(ID_ATTR, id.to_string());
    }

    fn track_group_id(&self) -> SetResult<i64> {
        int_value(required_child(self.element(), TRACK_GROUP_ID_TAG)?)
    }

    fn set_track_group_id(&mut self, group_id: i64) -> SetResult<()> {
        set_int_value(
            required_child_mut(self.element_mut(), TRACK_GROUP_ID_TAG)?,
            group_id,
        );
        Ok(())
    }

    fn is_return_track(&self) -> bool {
        self.element().tag() == ReturnTrack::TAG
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryTrackKind {
    Audio,
    Group,
    Midi,
}

impl PrimaryTrackKind {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Audio => "AudioTrack",
            Self::Group => "GroupTrack",
            Self::Midi => "MidiTrack",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "AudioTrack" => Some(Self::Audio),
            "GroupTrack" => Some(Self::Group),
            "MidiTrack" => Some(Self::Midi),
            _ => None,
        }
    }
}

/// An audio, group, or MIDI track, as an owned snapshot.
#[derive(Debug, Clone)]
pub struct PrimaryTrack {
    element: Element,
    kind: PrimaryTrackKind,
}

impl PrimaryTrack {
    pub fn from_element(element: Element) -> SetResult<Self> {
        let kind = PrimaryTrackKind::from_tag(element.tag()).ok_or_else(|| {
            SetError::Schema(format!("unrecognized primary track tag: {}", element.tag()))
        })?;
        Ok(Self { element, kind })
    }

    #[must_use]
    pub fn kind(&self) -> PrimaryTrackKind {
        self.kind
    }

    pub(crate) fn into_element(self) -> Element {
        self.element
    }
}

impl Track for PrimaryTrack {
    fn element(&self) -> &Element {
        &self.element
    }

    fn element_mut(&mut self) -> &mut Element {
        &mut self.element
    }
}

impl MixerTrack for PrimaryTrack {}

/// A return track snapshot, bundled with its derived send-matrix context:
/// the index of its column in every mixer track's send list, and its
/// pre/post flag from `SendsPre`. Both are recomputed at enumeration time,
/// never read from the element.
#[derive(Debug, Clone)]
pub struct ReturnTrack {
    element: Element,
    send_index: usize,
    send_pre: bool,
}

impl ReturnTrack {
    pub const TAG: &'static str = "ReturnTrack";

    pub fn new(element: Element, send_index: usize, send_pre: bool) -> SetResult<Self> {
        if element.tag() != Self::TAG {
            return Err(SetError::Schema(format!(
                "expected <{}>, found <{}>",
                Self::TAG,
                element.tag()
            )));
        }
        Ok(Self {
            element,
            send_index,
            send_pre,
        })
    }

    #[must_use]
    pub fn send_index(&self) -> usize {
        self.send_index
    }

    #[must_use]
    pub fn send_pre(&self) -> bool {
        self.send_pre
    }

    pub(crate) fn into_element(self) -> Element {
        self.element
    }
}

impl Track for ReturnTrack {
    fn element(&self) -> &Element {
        &self.element
    }

    fn element_mut(&mut self) -> &mut Element {
        &mut self.element
    }
}

impl MixerTrack for ReturnTrack {}

/// The main track snapshot. It has no track ID and no send list.
#[derive(Debug, Clone)]
pub struct MainTrack {
    element: Element,
}

impl MainTrack {
    pub const TAG: &'static str = "MainTrack";

    pub fn from_element(element: Element) -> SetResult<Self> {
        if element.tag() != Self::TAG {
            return Err(SetError::Schema(format!(
                "expected <{}>, found <{}>",
                Self::TAG,
                element.tag()
            )));
        }
        Ok(Self { element })
    }

    pub(crate) fn into_element(self) -> Element {
        self.element
    }
}

impl Track for MainTrack {
    fn element(&self) -> &Element {
        &self.element
    }

    fn element_mut(&mut self) -> &mut Element {
        &mut self.element
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingKind {
    AudioInput,
    AudioOutput,
    MidiInput,
    MidiOutput,
}

impl RoutingKind {
    pub const ALL: [Self; 4] = [
        Self::AudioInput,
        Self::AudioOutput,
        Self::MidiInput,
        Self::MidiOutput,
    ];

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::AudioInput => "AudioInputRouting",
            Self::AudioOutput => "AudioOutputRouting",
            Self::MidiInput => "MidiInputRouting",
            Self::MidiOutput => "MidiOutputRouting",
        }
    }
}

/// An input or output routing of a device chain. The target string may
/// embed a `Track.<id>` reference.
pub struct Routing<'a> {
    element: &'a mut Element,
}

impl<'a> Routing<'a> {
    const TARGET_TAG: &'static str = "Target";

    pub(crate) fn new(element: &'a mut Element, kind: RoutingKind) -> SetResult<Self> {
        if element.tag() != kind.tag() {
            return Err(SetError::Schema(format!(
                "expected <{}>, found <{}>",
                kind.tag(),
                element.tag()
            )));
        }
        Ok(Self { element })
    }

    pub fn target(&self) -> SetResult<&str> {
        str_value(required_child(self.element, Self::TARGET_TAG)?)
    }

    pub fn set_target(&mut self, target: &str) -> SetResult<()> {
        required_child_mut(self.element, Self::TARGET_TAG)?.set_attr(VALUE_ATTR, target);
        Ok(())
    }

    pub fn upper_display_string(&self) -> SetResult<&str> {
        str_value(required_child(self.element, "UpperDisplayString")?)
    }

    pub fn lower_display_string(&self) -> SetResult<&str> {
        str_value(required_child(self.element, "LowerDisplayString")?)
    }
}

pub struct DeviceChain<'a> {
    element: &'a mut Element,
}

impl<'a> DeviceChain<'a> {
    pub const TAG: &'static str = "DeviceChain";

    pub(crate) fn new(element: &'a mut Element) -> SetResult<Self> {
        if element.tag() != Self::TAG {
            return Err(SetError::Schema(format!(
                "expected <{}>, found <{}>",
                Self::TAG,
                element.tag()
            )));
        }
        Ok(Self { element })
    }

    pub fn routing(&mut self, kind: RoutingKind) -> SetResult<Routing<'_>> {
        Routing::new(required_child_mut(self.element, kind.tag())?, kind)
    }

    pub fn mixer(&mut self) -> SetResult<Mixer<'_>> {
        Mixer::new(required_child_mut(self.element, Mixer::TAG)?)
    }
}

pub struct Mixer<'a> {
    element: &'a mut Element,
}

impl<'a> Mixer<'a> {
    pub const TAG: &'static str = "Mixer";

    pub(crate) fn new(element: &'a mut Element) -> SetResult<Self> {
        if element.tag() != Self::TAG {
            return Err(SetError::Schema(format!(
                "expected <{}>, found <{}>",
                Self::TAG,
                element.tag()
            )));
        }
        Ok(Self { element })
    }

    pub fn sends(&mut self) -> SetResult<Sends<'_>> {
        Sends::new(required_child_mut(self.element, Sends::TAG)?)
    }
}

/// Shortcut from a mixer track element straight to its send list.
pub(crate) fn sends_of(track_element: &mut Element) -> SetResult<Sends<'_>> {
    let chain = required_child_mut(track_element, DeviceChain::TAG)?;
    let mixer = required_child_mut(chain, Mixer::TAG)?;
    Sends::new(required_child_mut(mixer, Sends::TAG)?)
}

/// A per-(mixer-track, return-track) send connection.
#[derive(Debug, Clone)]
pub struct Send {
    element: Element,
}

impl Send {
    pub const TAG: &'static str = "Send";

    // The format saves "zero-valued" sends with this slightly-nonzero
    // value; new sends use it to match native behavior.
    const MIN_VALUE_STR: &'static str = "0.0003162277571";

    /// Builds a blank send with the given automation and modulation target
    /// pointee IDs.
    #[must_use]
    pub fn create(automation_target_id: i64, modulation_target_id: i64) -> Self {
        let element = Element::new(Self::TAG)
            .with_child(Element::new("LomId").with_attr(VALUE_ATTR, "0"))
            .with_child(Element::new("Manual").with_attr(VALUE_ATTR, Self::MIN_VALUE_STR))
            .with_child(
                Element::new("MidiControllerRange")
                    .with_child(Element::new("Min").with_attr(VALUE_ATTR, Self::MIN_VALUE_STR))
                    .with_child(Element::new("Max").with_attr(VALUE_ATTR, "1")),
            )
            .with_child(
                Element::new("AutomationTarget")
                    .with_attr(ID_ATTR, automation_target_id.to_string())
                    .with_child(Element::new("LockEnvelope").with_attr(VALUE_ATTR, "0")),
            )
            .with_child(
                Element::new("ModulationTarget")
                    .with_attr(ID_ATTR, modulation_target_id.to_string())
                    .with_child(Element::new("LockEnvelope").with_attr(VALUE_ATTR, "0")),
            );
        Self { element }
    }

    pub fn from_element(element: Element) -> SetResult<Self> {
        if element.tag() != Self::TAG {
            return Err(SetError::Schema(format!(
                "expected <{}>, found <{}>",
                Self::TAG,
                element.tag()
            )));
        }
        Ok(Self { element })
    }

    /// The manual send level.
    pub fn value(&self) -> SetResult<f64> {
        parse_float_attr(required_child(&self.element, "Manual")?, VALUE_ATTR)
    }

    pub fn set_value(&mut self, value: f64) -> SetResult<()> {
        required_child_mut(&mut self.element, "Manual")?.set_attr(VALUE_ATTR, value.to_string());
        Ok(())
    }

    /// The controller range as `(min, max)`.
    pub fn controller_range(&self) -> SetResult<(f64, f64)> {
        let range = required_child(&self.element, "MidiControllerRange")?;
        Ok((
            parse_float_attr(required_child(range, "Min")?, VALUE_ATTR)?,
            parse_float_attr(required_child(range, "Max")?, VALUE_ATTR)?,
        ))
    }

    pub(crate) fn into_element(self) -> Element {
        self.element
    }
}

/// One entry of a mixer track's send list: a send plus its enabled flag,
/// under a positional ID.
#[derive(Debug, Clone)]
pub struct TrackSendHolder {
    element: Element,
}

impl TrackSendHolder {
    pub const TAG: &'static str = "TrackSendHolder";

    pub fn from_element(element: Element) -> SetResult<Self> {
        if element.tag() != Self::TAG {
            return Err(SetError::Schema(format!(
                "expected <{}>, found <{}>",
                Self::TAG,
                element.tag()
            )));
        }
        Ok(Self { element })
    }

    pub fn id(&self) -> SetResult<i64> {
        parse_int_attr(&self.element, ID_ATTR)
    }

    pub fn enabled_by_user(&self) -> SetResult<bool> {
        bool_value(required_child(&self.element, "EnabledByUser")?)
    }

    pub fn send(&self) -> SetResult<Send> {
        Send::from_element(required_child(&self.element, Send::TAG)?.clone())
    }
}

/// A mixer track's ordered send list, one holder per return track.
///
/// Inserts and deletes keep every holder's declared ID equal to its
/// position; a mismatch found while renumbering is an internal consistency
/// fault and aborts.
pub struct Sends<'a> {
    element: &'a mut Element,
}

impl<'a> Sends<'a> {
    pub const TAG: &'static str = "Sends";

    pub(crate) fn new(element: &'a mut Element) -> SetResult<Self> {
        if element.tag() != Self::TAG {
            return Err(SetError::Schema(format!(
                "expected <{}>, found <{}>",
                Self::TAG,
                element.tag()
            )));
        }
        Ok(Self { element })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.element.children().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.element.children().is_empty()
    }

    /// The holder at `index`, as an owned copy, or `None` past the end.
    pub fn holder(&self, index: usize) -> SetResult<Option<TrackSendHolder>> {
        match self.element.children().get(index) {
            Some(child) => TrackSendHolder::from_element(child.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Inserts `send` at `index`, wrapped in a fresh holder, and renumbers
    /// the holders after it.
    pub fn insert_send(&mut self, index: usize, send: Send, enabled_by_user: bool) -> SetResult<()> {
        let holder = Element::new(TrackSendHolder::TAG)
            .with_attr(ID_ATTR, index.to_string())
            .with_child(send.into_element())
            .with_child(Element::new("EnabledByUser").with_attr(VALUE_ATTR, bool_str(enabled_by_user)));
        self.element.insert_child(index, holder);
        renumber_positional_ids(self.element.children_mut(), index + 1, -1)
    }

    /// Deletes the holder at `index` and renumbers the holders after it.
    pub fn delete_send(&mut self, index: usize) -> SetResult<()> {
        let tag = self.element.children()[index].tag();
        assert_eq!(
            tag,
            TrackSendHolder::TAG,
            "unexpected child element in send list: {tag}"
        );
        self.element.remove_child(index);
        renumber_positional_ids(self.element.children_mut(), index, 1)
    }
}

/// The document-wide pre/post flag array, index-aligned with return-track
/// position. Same positional-ID discipline as [`Sends`].
pub struct SendsPre<'a> {
    element: &'a mut Element,
}

impl<'a> SendsPre<'a> {
    pub const TAG: &'static str = "SendsPre";
    pub const BOOL_TAG: &'static str = "SendPreBool";

    pub(crate) fn new(element: &'a mut Element) -> SetResult<Self> {
        if element.tag() != Self::TAG {
            return Err(SetError::Schema(format!(
                "expected <{}>, found <{}>",
                Self::TAG,
                element.tag()
            )));
        }
        Ok(Self { element })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.element.children().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.element.children().is_empty()
    }

    pub fn insert_flag(&mut self, index: usize, value: bool) -> SetResult<()> {
        let flag = Element::new(Self::BOOL_TAG)
            .with_attr(ID_ATTR, index.to_string())
            .with_attr(VALUE_ATTR, bool_str(value));
        self.element.insert_child(index, flag);
        renumber_positional_ids(self.element.children_mut(), index + 1, -1)
    }

    pub fn delete_flag(&mut self, index: usize) -> SetResult<()> {
        let tag = self.element.children()[index].tag();
        assert_eq!(
            tag,
            Self::BOOL_TAG,
            "unexpected child element in SendsPre: {tag}"
        );
        self.element.remove_child(index);
        renumber_positional_ids(self.element.children_mut(), index, 1)
    }
}

/// Reads a `SendsPre` element's entries as `(declared_id, value)` pairs.
pub(crate) fn read_send_pre_entries(element: &Element) -> SetResult<Vec<(i64, bool)>> {
    if element.tag() != SendsPre::TAG {
        return Err(SetError::Schema(format!(
            "expected <{}>, found <{}>",
            SendsPre::TAG,
            element.tag()
        )));
    }
    element
        .children()
        .iter()
        .map(|child| {
            if child.tag() != SendsPre::BOOL_TAG {
                return Err(SetError::Schema(format!(
                    "unexpected child element in SendsPre: {}",
                    child.tag()
                )));
            }
            Ok((parse_int_attr(child, ID_ATTR)?, bool_value(child)?))
        })
        .collect()
}

/// Renumbers positional IDs from `start` onward after an insert or delete.
/// `shift` is the offset each entry's declared ID is expected to be away
/// from its new position (`-1` after an insert, `1` after a delete).
///
/// # Panics
///
/// Panics on a declared-ID/position mismatch: positional IDs are validated
/// at load time, so a mismatch here is an engine defect, not bad input.
fn renumber_positional_ids(children: &mut [Element], start: usize, shift: i64) -> SetResult<()> {
    for (position, child) in children.iter_mut().enumerate().skip(start) {
        let declared = parse_int_attr(child, ID_ATTR)?;
        let expected = position as i64 + shift;
        assert_eq!(
            declared, expected,
            "positional ID mismatch at index {position}"
        );
        child.set_attr(ID_ATTR, position.to_string());
    }
    Ok(())
}
