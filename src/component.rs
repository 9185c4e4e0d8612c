//! Component identification and naming.
//!
//! Every counter cluster belongs to a daemon component identified by a
//! packed integer: the low byte holds a [`ComponentKind`] and the high bits
//! carry two orthogonal direction flags. Direction is part of key equality
//! (a source and a destination of the same kind are distinct clusters) and
//! shows up in published output as a `src.` or `dst.` prefix.

use std::fmt;

/// The enumerated component kinds a cluster can belong to.
///
/// This is a closed list; the discriminant is the value stored in the low
/// byte of a [`Component`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ComponentKind {
    None = 0,
    File,
    Pipe,
    Tcp,
    Udp,
    Tcp6,
    Udp6,
    UnixStream,
    UnixDgram,
    Syslog,
    Network,
    Internal,
    Logstore,
    Program,
    Sql,
    SunStreams,
    Usertty,
    /// Meta-kind for whole source or destination groups; published as
    /// `source` or `destination` rather than with a direction prefix.
    Group,
    Center,
    Host,
    Global,
    Mongodb,
    Class,
    RuleId,
    Tag,
    Severity,
    Facility,
    Sender,
    Smtp,
    Amqp,
    Stomp,
    Redis,
    Snmp,
}

impl ComponentKind {
    const ALL: [ComponentKind; 33] = [
        ComponentKind::None,
        ComponentKind::File,
        ComponentKind::Pipe,
        ComponentKind::Tcp,
        ComponentKind::Udp,
        ComponentKind::Tcp6,
        ComponentKind::Udp6,
        ComponentKind::UnixStream,
        ComponentKind::UnixDgram,
        ComponentKind::Syslog,
        ComponentKind::Network,
        ComponentKind::Internal,
        ComponentKind::Logstore,
        ComponentKind::Program,
        ComponentKind::Sql,
        ComponentKind::SunStreams,
        ComponentKind::Usertty,
        ComponentKind::Group,
        ComponentKind::Center,
        ComponentKind::Host,
        ComponentKind::Global,
        ComponentKind::Mongodb,
        ComponentKind::Class,
        ComponentKind::RuleId,
        ComponentKind::Tag,
        ComponentKind::Severity,
        ComponentKind::Facility,
        ComponentKind::Sender,
        ComponentKind::Smtp,
        ComponentKind::Amqp,
        ComponentKind::Stomp,
        ComponentKind::Redis,
        ComponentKind::Snmp,
    ];

    /// Canonical name used in published output.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::None => "none",
            ComponentKind::File => "file",
            ComponentKind::Pipe => "pipe",
            ComponentKind::Tcp => "tcp",
            ComponentKind::Udp => "udp",
            ComponentKind::Tcp6 => "tcp6",
            ComponentKind::Udp6 => "udp6",
            ComponentKind::UnixStream => "unix-stream",
            ComponentKind::UnixDgram => "unix-dgram",
            ComponentKind::Syslog => "syslog",
            ComponentKind::Network => "network",
            ComponentKind::Internal => "internal",
            ComponentKind::Logstore => "logstore",
            ComponentKind::Program => "program",
            ComponentKind::Sql => "sql",
            ComponentKind::SunStreams => "sun-streams",
            ComponentKind::Usertty => "usertty",
            ComponentKind::Group => "group",
            ComponentKind::Center => "center",
            ComponentKind::Host => "host",
            ComponentKind::Global => "global",
            ComponentKind::Mongodb => "mongodb",
            ComponentKind::Class => "class",
            ComponentKind::RuleId => "rule_id",
            ComponentKind::Tag => "tag",
            ComponentKind::Severity => "severity",
            ComponentKind::Facility => "facility",
            ComponentKind::Sender => "sender",
            ComponentKind::Smtp => "smtp",
            ComponentKind::Amqp => "amqp",
            ComponentKind::Stomp => "stomp",
            ComponentKind::Redis => "redis",
            ComponentKind::Snmp => "snmp",
        }
    }

    /// This kind as a source-side component.
    pub const fn source(self) -> Component {
        Component::new(self).source()
    }

    /// This kind as a destination-side component.
    pub const fn destination(self) -> Component {
        Component::new(self).destination()
    }
}

/// A packed component identifier: kind plus direction flags.
///
/// The full packed value takes part in key equality, so `file` as a source
/// and `file` as a destination are distinct keys even though they share a
/// [`ComponentKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Component(u32);

impl Component {
    /// Mask selecting the kind byte.
    pub const KIND_MASK: u32 = 0x00ff;
    /// Flag marking a source-side component.
    pub const SOURCE: u32 = 0x0100;
    /// Flag marking a destination-side component.
    pub const DESTINATION: u32 = 0x0200;

    /// A component of the given kind with no direction flag.
    pub const fn new(kind: ComponentKind) -> Self {
        Self(kind as u32)
    }

    /// This component with the source flag set.
    pub const fn source(self) -> Self {
        Self(self.0 | Self::SOURCE)
    }

    /// This component with the destination flag set.
    pub const fn destination(self) -> Self {
        Self(self.0 | Self::DESTINATION)
    }

    /// The enumerated kind in the low byte.
    pub fn kind(self) -> ComponentKind {
        ComponentKind::ALL[(self.0 & Self::KIND_MASK) as usize]
    }

    /// Whether the source flag is set.
    pub fn is_source(self) -> bool {
        self.0 & Self::SOURCE != 0
    }

    /// Whether the destination flag is set.
    pub fn is_destination(self) -> bool {
        self.0 & Self::DESTINATION != 0
    }

    /// Direction prefix for published output. Source wins when both flags
    /// are set.
    pub fn direction_name(self) -> &'static str {
        if self.is_source() {
            "src."
        } else if self.is_destination() {
            "dst."
        } else {
            ""
        }
    }

    /// Displayable direction-and-kind label, e.g. `src.file` or `dst.tcp`.
    ///
    /// The `group` meta-kind renders as plain `source` or `destination`.
    ///
    /// # Panics
    ///
    /// Panics if the kind is `group` and neither direction flag is set;
    /// such a registration is a programming error.
    pub fn label(self) -> ComponentLabel {
        if self.kind() == ComponentKind::Group {
            assert!(
                self.is_source() || self.is_destination(),
                "group component registered without a direction flag"
            );
        }
        ComponentLabel(self)
    }
}

/// Display adapter returned by [`Component::label`].
#[derive(Debug, Clone, Copy)]
pub struct ComponentLabel(Component);

impl fmt::Display for ComponentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let component = self.0;
        if component.kind() == ComponentKind::Group {
            if component.is_source() {
                f.write_str("source")
            } else {
                f.write_str("destination")
            }
        } else {
            write!(f, "{}{}", component.direction_name(), component.kind().name())
        }
    }
}
