//! UDP 루프백 종단 간 테스트

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use vfr::decoder::{ChannelRenderer, PassthroughDecoder, Picture};
use vfr::{Config, FrameSender, Receiver, UdpTransport};

const CHUNK: usize = 1000;

fn localhost() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
}

fn frame(frame_id: u32) -> Vec<u8> {
    (0..CHUNK * 3 + 321).map(|i| (i as u32 ^ frame_id) as u8).collect()
}

#[tokio::test]
async fn test_loopback_reassembly() {
    let transport = UdpTransport::bind(localhost()).await.unwrap();
    let target = transport.local_addr().unwrap();

    let config = Config {
        chunk_payload_size: CHUNK,
        ..Config::default()
    };
    let (renderer, mut pictures) = ChannelRenderer::<Picture>::new(config.decode_queue_size);
    let mut receiver = Receiver::new(config, transport, PassthroughDecoder::new(), renderer);

    let mut sender = FrameSender::bind(localhost(), target, CHUNK).await.unwrap();
    sender.send_extradata(b"av1C-config").await.unwrap();
    for frame_id in 0..4u32 {
        if frame_id == 2 {
            // 프레임 2는 통째로 손실
            sender.skip_frame();
            continue;
        }
        sender.send_frame(&frame(frame_id)).await.unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut received = Vec::new();
    while received.len() < 3 && Instant::now() < deadline {
        if !receiver.poll_once(Instant::now()).unwrap() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        while let Ok(picture) = pictures.try_recv() {
            received.push(picture);
        }
    }

    let ids: Vec<u32> = received.iter().map(|p| p.frame_id).collect();
    assert_eq!(ids, vec![0, 1, 3]);
    assert_eq!(received[0].config.as_deref(), Some(&b"av1C-config"[..]));
    for picture in &received {
        assert_eq!(picture.data.as_ref(), &frame(picture.frame_id)[..]);
    }

    let engine = receiver.engine();
    assert_eq!(engine.sequence().dropped_count(), 1);
    assert_eq!(engine.sequence().expected_frame_id(), 4);
    assert_eq!(engine.current_extradata().map(|b| b.len()), Some(11));
}
