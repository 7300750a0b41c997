//! 프레임 조립 테이블
//!
//! frame_id별로 조립 중인 누적기를 보관한다. 서로 다른 프레임의 청크는
//! 자유롭게 섞여 들어오며 각각 독립적으로 처리된다.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::trace;

use crate::chunk::ChunkAccumulator;
use crate::{Config, Error, FrameId, Result};

/// 조립 중인 프레임
#[derive(Debug)]
pub struct FrameAccumulator {
    frame_id: FrameId,
    chunks: ChunkAccumulator,
    created_at: Instant,
    last_touched: Instant,
}

impl FrameAccumulator {
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn chunk_count(&self) -> u16 {
        self.chunks.chunk_count()
    }

    pub fn received_count(&self) -> u16 {
        self.chunks.received_count()
    }

    pub fn filled_bytes(&self) -> usize {
        self.chunks.filled_bytes()
    }

    pub fn last_touched(&self) -> Instant {
        self.last_touched
    }

    /// 마지막 청크 이후 경과 시간
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_touched)
    }

    pub fn missing_chunks(&self) -> Vec<u16> {
        self.chunks.missing_chunks()
    }

    pub fn receive_ratio(&self) -> f64 {
        self.chunks.receive_ratio()
    }
}

/// 조립 완료된 프레임
#[derive(Debug, Clone)]
pub struct CompletedFrame {
    pub frame_id: FrameId,

    /// 프레임 데이터 (실제 기록된 바이트만큼)
    pub data: Bytes,

    pub chunk_count: u16,

    /// 첫 청크부터 완료까지 걸린 시간
    pub assembly_time: Duration,
}

/// 청크 적용 결과
#[derive(Debug)]
pub enum Apply {
    /// 아직 조립 중 (`duplicate`는 이미 받은 청크였는지 여부)
    Pending { duplicate: bool },

    /// 조립 완료, 테이블에서 제거됨
    Complete(CompletedFrame),
}

/// 프레임 조립 테이블
#[derive(Debug)]
pub struct FrameTable {
    /// 청크 슬롯 크기 (C_MAX)
    chunk_size: usize,

    /// 동시 조립 프레임 상한
    max_pending: usize,

    /// 전체 버퍼 상한 (바이트)
    max_buffered_bytes: usize,

    frames: HashMap<FrameId, FrameAccumulator>,

    /// 현재 확보된 버퍼 합
    buffered_bytes: usize,

    /// 최근 완료된 frame_id (오래된 순, 최대 `max_pending`개)
    completed: VecDeque<FrameId>,
    completed_ids: HashSet<FrameId>,
}

impl FrameTable {
    pub fn new(chunk_size: usize, max_pending: usize, max_buffered_bytes: usize) -> Self {
        Self {
            chunk_size,
            max_pending,
            max_buffered_bytes,
            frames: HashMap::new(),
            buffered_bytes: 0,
            completed: VecDeque::new(),
            completed_ids: HashSet::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.chunk_payload_size,
            config.max_pending_frames,
            config.max_buffered_bytes,
        )
    }

    /// 청크 적용
    ///
    /// 최근 완료된 프레임의 청크는 중복으로 취급되어 다시 조립되지 않는다.
    /// 실패한 경우 테이블 상태는 바뀌지 않는다.
    pub fn apply(
        &mut self,
        frame_id: FrameId,
        chunk_index: u16,
        chunk_count: u16,
        payload: &[u8],
        now: Instant,
    ) -> Result<Apply> {
        if chunk_count == 0 {
            return Err(Error::malformed("chunk_count is zero"));
        }
        if chunk_index >= chunk_count {
            return Err(Error::malformed("chunk_index out of range"));
        }
        if payload.len() > self.chunk_size {
            return Err(Error::malformed("payload exceeds chunk size"));
        }

        let inserted = match self.frames.get_mut(&frame_id) {
            Some(frame) => {
                if frame.chunks.chunk_count() != chunk_count {
                    return Err(Error::malformed("chunk_count changed within frame"));
                }
                let inserted = frame.chunks.insert(chunk_index, payload)?;
                frame.last_touched = now;
                inserted
            }
            None if self.completed_ids.contains(&frame_id) => {
                trace!("완료된 프레임 {}의 늦은 청크 {} 무시", frame_id, chunk_index);
                return Ok(Apply::Pending { duplicate: true });
            }
            None => {
                let mut frame = self.create(frame_id, chunk_count, now)?;
                frame.chunks.insert(chunk_index, payload)?;
                if frame.chunks.is_complete() {
                    // 단일 청크 프레임은 테이블을 거치지 않음
                    return Ok(Apply::Complete(self.finish(frame, now)));
                }
                self.buffered_bytes += frame.chunks.buffer_len();
                self.frames.insert(frame_id, frame);
                true
            }
        };

        let complete = self
            .frames
            .get(&frame_id)
            .map_or(false, |frame| frame.chunks.is_complete());

        if complete {
            if let Some(frame) = self.frames.remove(&frame_id) {
                self.buffered_bytes = self.buffered_bytes.saturating_sub(frame.chunks.buffer_len());
                return Ok(Apply::Complete(self.finish(frame, now)));
            }
        }

        Ok(Apply::Pending { duplicate: !inserted })
    }

    fn create(&self, frame_id: FrameId, chunk_count: u16, now: Instant) -> Result<FrameAccumulator> {
        if self.frames.len() >= self.max_pending {
            return Err(Error::PendingLimitReached { limit: self.max_pending });
        }

        let mut chunks = ChunkAccumulator::new(self.chunk_size);
        let required = chunks.required_bytes(chunk_count)?;
        let fits = self
            .buffered_bytes
            .checked_add(required)
            .is_some_and(|total| total <= self.max_buffered_bytes);
        if !fits {
            return Err(Error::BufferOverflow {
                max_size: self.max_buffered_bytes,
            });
        }

        chunks
            .prepare(chunk_count)
            .map_err(|_| Error::Allocation { frame_id, bytes: required })?;

        trace!("프레임 {} 조립 시작: {} chunks", frame_id, chunk_count);

        Ok(FrameAccumulator {
            frame_id,
            chunks,
            created_at: now,
            last_touched: now,
        })
    }

    fn finish(&mut self, frame: FrameAccumulator, now: Instant) -> CompletedFrame {
        self.remember_completed(frame.frame_id);

        let assembly_time = now.saturating_duration_since(frame.created_at);
        let chunk_count = frame.chunks.chunk_count();
        CompletedFrame {
            frame_id: frame.frame_id,
            data: frame.chunks.into_bytes(),
            chunk_count,
            assembly_time,
        }
    }

    fn remember_completed(&mut self, frame_id: FrameId) {
        if self.completed.len() >= self.max_pending.max(1) {
            if let Some(oldest) = self.completed.pop_front() {
                self.completed_ids.remove(&oldest);
            }
        }
        self.completed.push_back(frame_id);
        self.completed_ids.insert(frame_id);
    }

    /// 최근에 완료된 프레임인지 여부
    pub fn recently_completed(&self, frame_id: FrameId) -> bool {
        self.completed_ids.contains(&frame_id)
    }

    /// 조건을 만족하지 않는 프레임 제거, 제거된 프레임 목록 반환
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<FrameAccumulator>
    where
        F: FnMut(&FrameAccumulator) -> bool,
    {
        let stale: Vec<FrameId> = self
            .frames
            .values()
            .filter(|frame| !keep(frame))
            .map(|frame| frame.frame_id)
            .collect();

        let mut removed = Vec::with_capacity(stale.len());
        for frame_id in stale {
            if let Some(frame) = self.frames.remove(&frame_id) {
                self.buffered_bytes = self.buffered_bytes.saturating_sub(frame.chunks.buffer_len());
                removed.push(frame);
            }
        }
        removed
    }

    pub fn get(&self, frame_id: FrameId) -> Option<&FrameAccumulator> {
        self.frames.get(&frame_id)
    }

    pub fn contains(&self, frame_id: FrameId) -> bool {
        self.frames.contains_key(&frame_id)
    }

    /// 조립 중인 프레임 수
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// 모든 조립 중 프레임 폐기 (종료 시)
    pub fn clear(&mut self) {
        self.frames.clear();
        self.buffered_bytes = 0;
        self.completed.clear();
        self.completed_ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_MAX: usize = 1400;

    fn table() -> FrameTable {
        FrameTable::new(C_MAX, 64, 64 * 1024 * 1024)
    }

    fn pattern(index: u16, len: usize) -> Vec<u8> {
        vec![index as u8 + 1; len]
    }

    #[test]
    fn test_out_of_order_completion() {
        let mut table = table();
        let now = Instant::now();
        let sizes = [C_MAX, C_MAX, C_MAX, 500];

        let mut result = None;
        for index in [1u16, 3, 2, 0] {
            let payload = pattern(index, sizes[index as usize]);
            result = Some(table.apply(1, index, 4, &payload, now).unwrap());
            if index != 0 {
                assert!(matches!(result, Some(Apply::Pending { duplicate: false })));
            }
        }

        let Some(Apply::Complete(frame)) = result else {
            panic!("4번째 청크 후 완료되어야 함");
        };
        assert_eq!(frame.frame_id, 1);
        assert_eq!(frame.data.len(), 1400 * 3 + 500);
        assert_eq!(frame.data.len(), 4700);
        assert_eq!(&frame.data[..C_MAX], &pattern(0, C_MAX)[..]);
        assert_eq!(&frame.data[3 * C_MAX..], &pattern(3, 500)[..]);

        assert!(table.is_empty());
        assert_eq!(table.buffered_bytes(), 0);
    }

    #[test]
    fn test_every_permutation_completes() {
        let orders: [[u16; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        let sizes = [C_MAX, C_MAX, 123];

        for (frame_id, order) in orders.iter().enumerate() {
            let mut table = table();
            let now = Instant::now();
            let mut last = None;
            for &index in order {
                last = Some(table.apply(frame_id as u32, index, 3, &pattern(index, sizes[index as usize]), now).unwrap());
            }
            match last {
                Some(Apply::Complete(frame)) => assert_eq!(frame.data.len(), sizes.iter().sum::<usize>()),
                other => panic!("완료되지 않음: {:?}", other),
            }
        }
    }

    #[test]
    fn test_duplicate_is_idempotent() {
        let mut table = table();
        let now = Instant::now();

        table.apply(9, 0, 3, &pattern(0, C_MAX), now).unwrap();
        let before = (table.get(9).unwrap().received_count(), table.get(9).unwrap().filled_bytes());

        let result = table.apply(9, 0, 3, &pattern(0, C_MAX), now).unwrap();
        assert!(matches!(result, Apply::Pending { duplicate: true }));

        let frame = table.get(9).unwrap();
        assert_eq!((frame.received_count(), frame.filled_bytes()), before);
        assert_eq!(before, (1, C_MAX));
    }

    #[test]
    fn test_duplicates_do_not_fake_completion() {
        let mut table = table();
        let now = Instant::now();

        for _ in 0..5 {
            let result = table.apply(2, 1, 2, &pattern(1, 10), now).unwrap();
            assert!(matches!(result, Apply::Pending { .. }));
        }
        assert!(matches!(
            table.apply(2, 0, 2, &pattern(0, C_MAX), now).unwrap(),
            Apply::Complete(_)
        ));
    }

    #[test]
    fn test_duplicate_touches_timestamp() {
        let mut table = table();
        let start = Instant::now();
        let later = start + Duration::from_millis(300);

        table.apply(5, 0, 2, &pattern(0, C_MAX), start).unwrap();
        table.apply(5, 0, 2, &pattern(0, C_MAX), later).unwrap();
        assert_eq!(table.get(5).unwrap().last_touched(), later);
    }

    #[test]
    fn test_single_chunk_frame() {
        let mut table = table();
        let result = table.apply(3, 0, 1, b"tiny", Instant::now()).unwrap();
        match result {
            Apply::Complete(frame) => assert_eq!(frame.data.as_ref(), b"tiny"),
            other => panic!("완료되어야 함: {:?}", other),
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_repeated_single_chunk_frame_completes_once() {
        let mut table = table();
        let now = Instant::now();

        assert!(matches!(table.apply(0, 0, 1, b"one", now).unwrap(), Apply::Complete(_)));
        assert!(matches!(
            table.apply(0, 0, 1, b"one", now).unwrap(),
            Apply::Pending { duplicate: true }
        ));
        assert!(table.is_empty());
        assert!(table.recently_completed(0));
    }

    #[test]
    fn test_late_chunk_of_completed_frame_is_duplicate() {
        let mut table = FrameTable::new(C_MAX, 1, usize::MAX);
        let now = Instant::now();

        table.apply(1, 0, 2, &pattern(0, C_MAX), now).unwrap();
        assert!(matches!(table.apply(1, 1, 2, b"end", now).unwrap(), Apply::Complete(_)));

        // 늦게 온 중복 청크가 빈 누적기를 만들지 않음
        assert!(matches!(
            table.apply(1, 0, 2, &pattern(0, C_MAX), now).unwrap(),
            Apply::Pending { duplicate: true }
        ));
        assert!(table.is_empty());
        assert_eq!(table.buffered_bytes(), 0);

        // 대기 슬롯도 차지하지 않음
        table.apply(2, 0, 2, b"x", now).unwrap();
        assert!(table.contains(2));
    }

    #[test]
    fn test_completed_history_is_bounded() {
        let mut table = FrameTable::new(C_MAX, 2, usize::MAX);
        let now = Instant::now();

        for frame_id in 0..3u32 {
            table.apply(frame_id, 0, 1, b"f", now).unwrap();
        }
        assert!(!table.recently_completed(0));
        assert!(table.recently_completed(1));
        assert!(table.recently_completed(2));

        // 기억에서 밀려난 프레임보다 낮은 frame_id도 정상 조립
        assert!(matches!(table.apply(0, 0, 1, b"f", now).unwrap(), Apply::Complete(_)));
    }

    #[test]
    fn test_oversized_frame_rejected_without_panic() {
        let huge = usize::MAX / 2 + 1;

        let mut table = FrameTable::new(huge, 4, usize::MAX);
        assert!(matches!(
            table.apply(1, 0, 3, b"x", Instant::now()),
            Err(Error::BufferOverflow { .. })
        ));

        // 곱셈은 넘치지 않지만 할당할 수 없는 크기
        assert!(matches!(
            table.apply(2, 0, 1, b"x", Instant::now()),
            Err(Error::Allocation { frame_id: 2, .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_malformed_chunks_leave_table_untouched() {
        let mut table = table();
        let now = Instant::now();

        assert!(matches!(table.apply(1, 0, 0, b"x", now), Err(Error::MalformedPacket { .. })));
        assert!(matches!(table.apply(1, 3, 3, b"x", now), Err(Error::MalformedPacket { .. })));
        assert!(matches!(
            table.apply(1, 0, 3, &vec![0u8; C_MAX + 1], now),
            Err(Error::MalformedPacket { .. })
        ));
        assert!(table.is_empty());

        table.apply(1, 0, 3, b"x", now).unwrap();
        assert!(matches!(table.apply(1, 1, 4, b"y", now), Err(Error::MalformedPacket { .. })));
        assert_eq!(table.get(1).unwrap().received_count(), 1);
    }

    #[test]
    fn test_pending_limit() {
        let mut table = FrameTable::new(C_MAX, 2, usize::MAX);
        let now = Instant::now();

        table.apply(1, 0, 2, b"a", now).unwrap();
        table.apply(2, 0, 2, b"b", now).unwrap();
        assert!(matches!(
            table.apply(3, 0, 2, b"c", now),
            Err(Error::PendingLimitReached { limit: 2 })
        ));
        assert_eq!(table.len(), 2);

        // 기존 프레임은 계속 조립 가능
        assert!(matches!(table.apply(1, 1, 2, b"a", now).unwrap(), Apply::Complete(_)));
        table.apply(3, 0, 2, b"c", now).unwrap();
        assert!(table.contains(3));
    }

    #[test]
    fn test_buffer_limit() {
        let mut table = FrameTable::new(100, 16, 500);
        let now = Instant::now();

        table.apply(1, 0, 4, b"a", now).unwrap();
        assert_eq!(table.buffered_bytes(), 400);
        assert!(matches!(
            table.apply(2, 0, 2, b"b", now),
            Err(Error::BufferOverflow { max_size: 500 })
        ));
        table.apply(3, 0, 2, b"c", now).ok();
        assert!(!table.contains(3));
    }

    #[test]
    fn test_retain_updates_accounting() {
        let mut table = FrameTable::new(10, 16, usize::MAX);
        let now = Instant::now();
        table.apply(1, 0, 2, b"a", now).unwrap();
        table.apply(2, 0, 3, b"b", now).unwrap();

        let removed = table.retain(|frame| frame.frame_id() != 2);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].frame_id(), 2);
        assert_eq!(removed[0].missing_chunks(), vec![1, 2]);
        assert_eq!(table.buffered_bytes(), 20);
    }
}
