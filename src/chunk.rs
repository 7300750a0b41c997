//! 청크 누적기와 분할기
//!
//! - ChunkAccumulator: 한 논리 단위(프레임 또는 extradata)의 조립 버퍼
//! - FrameChunker: 송신측에서 논리 단위를 데이터그램으로 분할

use std::collections::TryReserveError;

use bytes::Bytes;

use crate::packet::{ChunkHeader, PacketType};
use crate::{Error, FrameId, Result};

/// 청크 조립 버퍼
///
/// 청크 `i`는 항상 `i * chunk_size` 위치에 기록된다. 마지막 청크는 보통
/// `chunk_size`보다 짧으므로 최종 길이는 실제 기록된 바이트 합으로 계산한다.
#[derive(Debug)]
pub struct ChunkAccumulator {
    /// 조립 데이터 (커지기만 함)
    buffer: Vec<u8>,

    /// 수신된 청크 비트맵 (chunk_index -> 수신 여부)
    received: Vec<bool>,

    /// 총 청크 수
    chunk_count: u16,

    /// 수신된 청크 수
    received_count: u16,

    /// 기록된 페이로드 바이트 합
    filled_bytes: usize,

    /// 청크 슬롯 크기 (C_MAX)
    chunk_size: usize,
}

impl ChunkAccumulator {
    /// 빈 누적기 생성 (버퍼 할당 없음)
    pub fn new(chunk_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            received: Vec::new(),
            chunk_count: 0,
            received_count: 0,
            filled_bytes: 0,
            chunk_size,
        }
    }

    /// `chunk_count`개 청크에 필요한 버퍼 크기
    pub fn required_bytes(&self, chunk_count: u16) -> Result<usize> {
        (chunk_count as usize)
            .checked_mul(self.chunk_size)
            .ok_or(Error::BufferOverflow { max_size: usize::MAX })
    }

    /// 새 조립 시작 준비
    ///
    /// 버퍼를 `chunk_count * chunk_size`까지 키우고 (줄이지는 않음)
    /// 진행 상태를 초기화한다. 할당 실패는 패닉 대신 에러로 돌려준다.
    pub fn prepare(&mut self, chunk_count: u16) -> std::result::Result<(), TryReserveError> {
        // 넘치면 usize::MAX로 고정되어 try_reserve_exact가 실패함
        let required = (chunk_count as usize).saturating_mul(self.chunk_size);
        if self.buffer.len() < required {
            self.buffer.try_reserve_exact(required - self.buffer.len())?;
            self.buffer.resize(required, 0);
        }

        self.received.clear();
        self.received.try_reserve_exact(chunk_count as usize)?;
        self.received.resize(chunk_count as usize, false);

        self.chunk_count = chunk_count;
        self.received_count = 0;
        self.filled_bytes = 0;
        Ok(())
    }

    /// 청크 삽입
    ///
    /// 처음 보는 인덱스면 `true`, 이미 받은 인덱스면 카운터를 건드리지 않고 `false`.
    pub fn insert(&mut self, chunk_index: u16, payload: &[u8]) -> Result<bool> {
        let index = chunk_index as usize;
        if index >= self.received.len() {
            return Err(Error::malformed("chunk_index out of range"));
        }
        if payload.len() > self.chunk_size {
            return Err(Error::malformed("payload exceeds chunk size"));
        }

        let offset = index * self.chunk_size;
        self.buffer[offset..offset + payload.len()].copy_from_slice(payload);

        if self.received[index] {
            return Ok(false);
        }

        self.received[index] = true;
        self.received_count += 1;
        self.filled_bytes += payload.len();
        Ok(true)
    }

    /// 완료 여부 확인
    pub fn is_complete(&self) -> bool {
        self.chunk_count > 0 && self.received_count == self.chunk_count
    }

    /// 진행 중인 조립이 있는지 여부
    pub fn in_progress(&self) -> bool {
        self.received_count > 0
    }

    pub fn chunk_count(&self) -> u16 {
        self.chunk_count
    }

    pub fn received_count(&self) -> u16 {
        self.received_count
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn filled_bytes(&self) -> usize {
        self.filled_bytes
    }

    /// 현재 확보된 버퍼 크기
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// 누락된 청크 인덱스 목록 반환
    pub fn missing_chunks(&self) -> Vec<u16> {
        self.received
            .iter()
            .enumerate()
            .filter(|(_, &received)| !received)
            .map(|(index, _)| index as u16)
            .collect()
    }

    /// 수신률 계산
    pub fn receive_ratio(&self) -> f64 {
        if self.chunk_count == 0 {
            return 0.0;
        }
        self.received_count as f64 / self.chunk_count as f64
    }

    /// 조립된 바이트 복사본 (버퍼는 재사용을 위해 유지)
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buffer[..self.filled_bytes])
    }

    /// 진행 상태만 초기화 (버퍼 크기 유지)
    pub fn clear_progress(&mut self) {
        self.received.iter_mut().for_each(|slot| *slot = false);
        self.received_count = 0;
        self.filled_bytes = 0;
    }

    /// 완료된 데이터 추출 (복사 없음)
    pub fn into_bytes(mut self) -> Bytes {
        self.buffer.truncate(self.filled_bytes);
        Bytes::from(self.buffer)
    }
}

/// 논리 단위 분할기 (송신측)
pub struct FrameChunker {
    chunk_size: usize,
}

impl FrameChunker {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// 데이터를 와이어 포맷 데이터그램들로 분할
    ///
    /// 빈 데이터도 빈 페이로드 청크 하나로 보낸다.
    pub fn split(&self, packet_type: PacketType, frame_id: FrameId, data: &[u8]) -> Result<Vec<Bytes>> {
        if self.chunk_size == 0 {
            return Err(Error::malformed("chunk size is zero"));
        }

        let chunk_count = data.len().div_ceil(self.chunk_size).max(1);
        if chunk_count > u16::MAX as usize {
            return Err(Error::BufferOverflow {
                max_size: (u16::MAX as usize).saturating_mul(self.chunk_size),
            });
        }
        let chunk_count = chunk_count as u16;

        if data.is_empty() {
            let header = ChunkHeader::new(packet_type, frame_id, 0, 1);
            return Ok(vec![header.to_datagram(&[])]);
        }

        Ok(data
            .chunks(self.chunk_size)
            .enumerate()
            .map(|(index, payload)| {
                ChunkHeader::new(packet_type, frame_id, index as u16, chunk_count).to_datagram(payload)
            })
            .collect())
    }
}
