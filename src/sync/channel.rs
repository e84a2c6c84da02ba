//! Reportable quantities and their GATT characteristics.

/// One reportable quantity.
///
/// Every channel has a last-reported cache slot; five of them also have a
/// slot in the broadcast payload and six of them a GATT characteristic
/// (battery goes through the Battery Service instead).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Temperature,
    Humidity,
    Pressure,
    Co2,
    Voc,
    Iaq,
    Battery,
}

impl Channel {
    /// Number of channels.
    pub const COUNT: usize = 7;

    /// All channels in the order the update cycle processes them.
    pub const ALL: [Channel; Self::COUNT] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Pressure,
        Channel::Co2,
        Channel::Voc,
        Channel::Iaq,
        Channel::Battery,
    ];

    /// Dense index, used for cache slots and [`ChannelSet`] bits.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The ESS characteristic this channel is exposed through, if any.
    pub const fn characteristic(self) -> Option<Characteristic> {
        match self {
            Channel::Temperature => Some(Characteristic::Temperature),
            Channel::Humidity => Some(Characteristic::Humidity),
            Channel::Pressure => Some(Characteristic::Pressure),
            Channel::Co2 => Some(Characteristic::Co2),
            Channel::Voc => Some(Characteristic::Voc),
            Channel::Iaq => Some(Characteristic::Iaq),
            Channel::Battery => None,
        }
    }
}

/// Notifiable characteristics of the Environmental Sensing Service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Characteristic {
    Temperature,
    Humidity,
    Pressure,
    Co2,
    Voc,
    Iaq,
}

impl Characteristic {
    pub const COUNT: usize = 6;

    pub const ALL: [Characteristic; Self::COUNT] = [
        Characteristic::Temperature,
        Characteristic::Humidity,
        Characteristic::Pressure,
        Characteristic::Co2,
        Characteristic::Voc,
        Characteristic::Iaq,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// The channel backing this characteristic.
    pub const fn channel(self) -> Channel {
        match self {
            Characteristic::Temperature => Channel::Temperature,
            Characteristic::Humidity => Channel::Humidity,
            Characteristic::Pressure => Channel::Pressure,
            Characteristic::Co2 => Channel::Co2,
            Characteristic::Voc => Channel::Voc,
            Characteristic::Iaq => Channel::Iaq,
        }
    }
}

/// Small bit set of channels (one bit per [`Channel::index`]).
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSet(u8);

impl ChannelSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, channel: Channel) {
        self.0 |= 1 << channel.index();
    }

    pub const fn contains(self, channel: Channel) -> bool {
        self.0 & (1 << channel.index()) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_characteristic_maps_back_to_its_channel() {
        for ch in Characteristic::ALL {
            assert_eq!(ch.channel().characteristic(), Some(ch));
        }
        assert_eq!(Channel::Battery.characteristic(), None);
    }

    #[test]
    fn channel_set_tracks_members() {
        let mut set = ChannelSet::empty();
        assert!(set.is_empty());
        set.insert(Channel::Pressure);
        set.insert(Channel::Battery);
        set.insert(Channel::Pressure);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Channel::Battery));
        assert!(!set.contains(Channel::Temperature));

        let mut members = set.iter();
        assert_eq!(members.next(), Some(Channel::Pressure));
        assert_eq!(members.next(), Some(Channel::Battery));
        assert_eq!(members.next(), None);
    }
}
