#![no_main]
use libfuzzer_sys::fuzz_target;
use smolrpl::storage::{Component, Diagnostics, PacketPool};
use smolrpl::wire::ieee802154::{self, FrameType};
use smolrpl::wire::{Ieee802154Pan, LinkIdentity};

#[derive(Debug, arbitrary::Arbitrary)]
struct HeaderFuzzer<'a> {
    data: &'a [u8],
    extended: [u8; 8],
    pan_id: u16,
}

fuzz_target!(|input: HeaderFuzzer| {
    let identity = LinkIdentity::new(input.extended, Ieee802154Pan(input.pan_id));
    let mut diagnostics = Diagnostics::<4>::new();

    let header = ieee802154::retrieve_header(input.data, &identity, &mut diagnostics);
    assert!(header.header_length <= input.data.len());
    let Ok(header) = header.check() else {
        return;
    };

    // Whatever was parsed can be written back out.
    let mut storage = [PacketPool::EMPTY_SLOT; 1];
    let mut pool = PacketPool::new(&mut storage[..]);
    let mut buffer = pool.allocate(Component::Mac).unwrap();
    let _ = ieee802154::prepend_header(
        &mut buffer,
        FrameType::Data,
        header.security_enabled,
        header.sequence_number,
        &header.dst,
        &identity,
    );
    pool.free(buffer);
});
