//! 코덱 설정(extradata) 조립
//!
//! 스트림당 하나만 존재하며, 완료될 때마다 이전 값을 통째로 교체한다.

use bytes::Bytes;
use tracing::debug;

use crate::chunk::ChunkAccumulator;
use crate::{Error, Result};

/// extradata 조립기
#[derive(Debug)]
pub struct ExtradataAssembler {
    /// 조립 중인 버퍼 (완료 후에도 크기 유지)
    accumulator: ChunkAccumulator,

    /// 마지막으로 완료된 extradata
    current: Option<Bytes>,

    /// 완료 횟수
    completions: u64,
}

impl ExtradataAssembler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            accumulator: ChunkAccumulator::new(chunk_size),
            current: None,
            completions: 0,
        }
    }

    /// 청크 적용
    ///
    /// 조립이 완료되면 새 extradata를 반환한다. 호출측은 이를 디코더에
    /// 전달해야 하며, 디코더는 디코딩 상태를 리셋하는 설정으로 취급한다.
    pub fn apply(&mut self, chunk_index: u16, chunk_count: u16, payload: &[u8]) -> Result<Option<Bytes>> {
        if chunk_count == 0 {
            return Err(Error::malformed("chunk_count is zero"));
        }
        if chunk_index >= chunk_count {
            return Err(Error::malformed("chunk_index out of range"));
        }
        if payload.len() > self.accumulator.chunk_size() {
            return Err(Error::malformed("payload exceeds chunk size"));
        }

        // 진행 중이지 않거나 총 청크 수가 바뀌면 새 조립으로 시작
        if !self.accumulator.in_progress() || self.accumulator.chunk_count() != chunk_count {
            if self.accumulator.in_progress() {
                debug!(
                    "extradata 조립 재시작: chunk_count {} -> {}",
                    self.accumulator.chunk_count(),
                    chunk_count
                );
            }
            let bytes = self.accumulator.required_bytes(chunk_count)?;
            self.accumulator
                .prepare(chunk_count)
                .map_err(|_| Error::ExtradataAllocation { bytes })?;
        }

        self.accumulator.insert(chunk_index, payload)?;

        if !self.accumulator.is_complete() {
            return Ok(None);
        }

        let blob = self.accumulator.snapshot();
        self.accumulator.clear_progress();
        self.current = Some(blob.clone());
        self.completions += 1;
        Ok(Some(blob))
    }

    /// 현재 extradata
    pub fn current(&self) -> Option<&Bytes> {
        self.current.as_ref()
    }

    /// 지금까지 완료된 횟수
    pub fn completions(&self) -> u64 {
        self.completions
    }

    /// 진행 중인 조립의 수신 청크 수
    pub fn received_count(&self) -> u16 {
        self.accumulator.received_count()
    }
}
