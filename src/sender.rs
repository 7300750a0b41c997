//! 송신자 (스트림 소스측)
//!
//! - 프레임/extradata를 청크로 분할해 UDP로 전송
//! - 손실, 순서 뒤섞기, 중복을 흉내 내는 옵션 (수신측 검증용)

use std::net::SocketAddr;

use bytes::Bytes;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::chunk::FrameChunker;
use crate::packet::PacketType;
use crate::{FrameId, Result};

/// 전송 경로 흉내 옵션
#[derive(Debug, Clone, Default)]
pub struct ImpairmentOptions {
    /// 데이터그램 손실 비율 (0.0 ~ 1.0)
    pub loss_ratio: f64,

    /// 데이터그램 중복 비율 (0.0 ~ 1.0)
    pub duplicate_ratio: f64,

    /// 한 논리 단위 안에서 청크 순서 뒤섞기
    pub shuffle: bool,
}

impl ImpairmentOptions {
    pub fn is_clean(&self) -> bool {
        self.loss_ratio <= 0.0 && self.duplicate_ratio <= 0.0 && !self.shuffle
    }
}

/// 송신 통계
#[derive(Debug, Clone, Default)]
pub struct SenderStats {
    pub frames_sent: u64,
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    /// 손실 흉내로 보내지 않은 데이터그램 수
    pub datagrams_withheld: u64,
}

/// 프레임 송신자
pub struct FrameSender {
    socket: UdpSocket,
    target: SocketAddr,
    chunker: FrameChunker,
    next_frame_id: FrameId,
    impairment: ImpairmentOptions,
    stats: SenderStats,
}

impl FrameSender {
    /// 소켓 바인딩 후 송신자 생성
    pub async fn bind(bind_addr: SocketAddr, target: SocketAddr, chunk_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("Sender bound to {}, target: {}", socket.local_addr()?, target);

        Ok(Self {
            socket,
            target,
            chunker: FrameChunker::new(chunk_size),
            next_frame_id: 0,
            impairment: ImpairmentOptions::default(),
            stats: SenderStats::default(),
        })
    }

    pub fn with_impairment(mut self, impairment: ImpairmentOptions) -> Self {
        self.impairment = impairment;
        self
    }

    /// 첫 frame_id 지정
    pub fn starting_at(mut self, frame_id: FrameId) -> Self {
        self.next_frame_id = frame_id;
        self
    }

    /// extradata 전송
    pub async fn send_extradata(&mut self, data: &[u8]) -> Result<usize> {
        let datagrams = self.chunker.split(PacketType::Extradata, 0, data)?;
        debug!("extradata 전송: {} bytes, {} chunks", data.len(), datagrams.len());
        self.transmit(datagrams).await
    }

    /// 프레임 전송, 사용한 frame_id 반환
    pub async fn send_frame(&mut self, data: &[u8]) -> Result<FrameId> {
        let frame_id = self.next_frame_id;
        let datagrams = self.chunker.split(PacketType::Frame, frame_id, data)?;
        self.next_frame_id = self.next_frame_id.wrapping_add(1);

        self.transmit(datagrams).await?;
        self.stats.frames_sent += 1;
        Ok(frame_id)
    }

    /// 프레임 하나를 통째로 건너뜀 (frame_id만 소비)
    pub fn skip_frame(&mut self) -> FrameId {
        let frame_id = self.next_frame_id;
        self.next_frame_id = self.next_frame_id.wrapping_add(1);
        frame_id
    }

    async fn transmit(&mut self, datagrams: Vec<Bytes>) -> Result<usize> {
        let planned = datagrams.len();
        let outgoing = if self.impairment.is_clean() {
            datagrams
        } else {
            self.impair(datagrams)
        };
        self.stats.datagrams_withheld += planned.saturating_sub(outgoing.len()) as u64;

        let mut sent = 0;
        for datagram in &outgoing {
            sent += self.socket.send_to(datagram, self.target).await?;
            self.stats.datagrams_sent += 1;
        }
        self.stats.bytes_sent += sent as u64;
        Ok(sent)
    }

    // 난수 생성기는 await 전에 해제되어야 함
    fn impair(&self, datagrams: Vec<Bytes>) -> Vec<Bytes> {
        let mut rng = rand::thread_rng();
        let mut outgoing = Vec::with_capacity(datagrams.len());

        for datagram in datagrams {
            if rng.gen_bool(self.impairment.loss_ratio.clamp(0.0, 1.0)) {
                continue;
            }
            if rng.gen_bool(self.impairment.duplicate_ratio.clamp(0.0, 1.0)) {
                outgoing.push(datagram.clone());
            }
            outgoing.push(datagram);
        }

        if self.impairment.shuffle {
            outgoing.shuffle(&mut rng);
        }
        outgoing
    }

    pub fn next_frame_id(&self) -> FrameId {
        self.next_frame_id
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
