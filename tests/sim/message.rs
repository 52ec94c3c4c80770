use smolrpl::storage::Diagnostics;
use smolrpl::time::Instant;
use smolrpl::wire::ieee802154::{self, FCS_LEN};
use smolrpl::wire::*;

/// A frame as it went over the air, frame check sequence included.
#[derive(Debug, Clone)]
pub struct Message {
    pub at: Instant,
    pub from: usize,
    pub data: Vec<u8>,
}

impl Message {
    /// Parse the MAC header from the point of view of a bystander.
    pub fn header(&self) -> Option<Ieee802154Header> {
        let bystander = LinkIdentity::new([0; 8], Ieee802154Pan::BROADCAST);
        let mut diagnostics = Diagnostics::<4>::new();
        ieee802154::retrieve_header(&self.data, &bystander, &mut diagnostics)
            .check()
            .ok()
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self.header(), Some(header) if header.dst == Address::BROADCAST)
    }

    /// The destination as a neighbor hears it.
    pub fn to(&self) -> Option<Address> {
        self.header().map(|header| header.dst)
    }

    /// The MAC payload.
    pub fn payload(&self) -> Option<&[u8]> {
        let header = self.header()?;
        let end = self.data.len().checked_sub(FCS_LEN)?;
        self.data.get(header.header_length..end)
    }

    fn control(&self, code: RplControlMessage) -> Option<Icmpv6Packet<&[u8]>> {
        let packet = Icmpv6Packet::new_checked(self.payload()?).ok()?;
        if packet.msg_type() != Icmpv6Message::RplControl
            || RplControlMessage::from(packet.msg_code()) != code
        {
            return None;
        }
        Some(packet)
    }

    pub fn dio(&self) -> Option<RplDioRepr> {
        let packet = self.control(RplControlMessage::DodagInformationObject)?;
        RplDioRepr::parse(&RplDio::new_checked(packet.payload()).ok()?).ok()
    }

    pub fn dao(&self) -> Option<RplDaoRepr> {
        let packet = self.control(RplControlMessage::DestinationAdvertisementObject)?;
        RplDaoRepr::parse(&RplDao::new_checked(packet.payload()).ok()?).ok()
    }

    /// The parents listed in the transit option of a DAO.
    pub fn dao_parents(&self) -> Vec<[u8; 8]> {
        let Some(packet) = self.control(RplControlMessage::DestinationAdvertisementObject) else {
            return vec![];
        };
        let Ok(dao) = RplDao::new_checked(packet.payload()) else {
            return vec![];
        };
        match RplTransit::new_checked(dao.payload()) {
            Ok(transit) => transit.parents().collect(),
            Err(_) => vec![],
        }
    }

    pub fn is_dio(&self) -> bool {
        self.dio().is_some()
    }

    pub fn is_dao(&self) -> bool {
        self.dao().is_some()
    }
}
