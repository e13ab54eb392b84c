#![no_main]

use bytes::{Bytes, BytesMut};
use libfuzzer_sys::fuzz_target;
use robotmq_wire::descriptor::SegmentDescriptor;
use robotmq_wire::frame::FrameDecoder;
use robotmq_wire::message::Message;

fn reassemble(data: &[u8], max_size: Option<usize>) -> Vec<Bytes> {
    // Frame reassembly, fed in two uneven pieces.
    let split = data.first().map_or(0, |b| *b as usize % (data.len() + 1));
    let mut decoder = FrameDecoder::new(max_size);
    let mut buf = BytesMut::from(&data[..split]);
    let mut frames = Vec::new();
    while let Ok(Some(frame)) = decoder.decode(&mut buf) {
        frames.push(frame);
    }
    buf.extend_from_slice(&data[split..]);
    while let Ok(Some(frame)) = decoder.decode(&mut buf) {
        frames.push(frame);
    }
    frames
}

fuzz_target!(|data: &[u8]| {
    // Unbounded (client default) and size-limited (broker) decoders.
    let frames = reassemble(data, None);
    let bounded = reassemble(data, Some(1 << 20));
    assert!(bounded.len() <= frames.len());

    // Whole input and every decoded frame as a message.
    let _ = Message::decode(Bytes::copy_from_slice(data));
    for frame in frames {
        if let Ok(message) = Message::decode(frame) {
            // Compare bytes, not messages: timestamps may be NaN.
            let encoded = message.encode().expect("decoded message re-encodes");
            let again = Message::decode(encoded.clone()).and_then(|m| m.encode());
            assert_eq!(again.ok(), Some(encoded));
        }
    }

    // Descriptor parsing.
    if SegmentDescriptor::is_descriptor(data) {
        if let Ok(desc) = SegmentDescriptor::decode(data) {
            assert_eq!(&desc.encode()[..], data);
        }
    }
});
