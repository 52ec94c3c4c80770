#![no_main]
use libfuzzer_sys::fuzz_target;
use smolrpl::wire::*;

fuzz_target!(|data: &[u8]| {
    let Ok(packet) = Icmpv6Packet::new_checked(data) else {
        return;
    };
    if packet.msg_type() != Icmpv6Message::RplControl {
        return;
    }

    match RplControlMessage::from(packet.msg_code()) {
        RplControlMessage::DodagInformationObject => {
            let Ok(dio) = RplDio::new_checked(packet.payload()) else {
                return;
            };
            if let Ok(repr) = RplDioRepr::parse(&dio) {
                let mut buffer = vec![0u8; repr.buffer_len()];
                repr.emit(&mut RplDio::new_unchecked(&mut buffer[..]));
                assert_eq!(RplDioRepr::parse(&RplDio::new_unchecked(&buffer[..])), Ok(repr));

                if repr.options == RplDioOptions::Prefix {
                    if let Ok(option) = RplPrefixOption::new_checked(dio.payload()) {
                        let _ = RplPrefixOptionRepr::parse(&option);
                    }
                }
            }
        }
        RplControlMessage::DestinationAdvertisementObject => {
            let Ok(dao) = RplDao::new_checked(packet.payload()) else {
                return;
            };
            if let Ok(RplDaoRepr {
                transit: Some(_), ..
            }) = RplDaoRepr::parse(&dao)
            {
                let transit = RplTransit::new_checked(dao.payload()).unwrap();
                assert_eq!(transit.parents().count(), usize::from(transit.count()));
            }
        }
        _ => (),
    }
});
