//! 미완성 프레임 정리
//!
//! 매 폴링 주기마다 한 번씩 실행되며, 마지막 청크 이후 타임아웃을 넘긴
//! 프레임을 제거한다. 제거는 드롭 집계(`dropped_count`)에 반영하지 않는다.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::frame_table::FrameTable;
use crate::DEFAULT_EVICTION_TIMEOUT_MS;

/// 타임아웃 기반 정리기
#[derive(Debug, Clone)]
pub struct EvictionSweeper {
    timeout: Duration,
}

impl Default for EvictionSweeper {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_EVICTION_TIMEOUT_MS))
    }
}

impl EvictionSweeper {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 오래된 프레임 제거, 제거된 프레임 수 반환
    ///
    /// 경과 시간이 타임아웃을 초과해야 제거된다 (정확히 같으면 유지).
    pub fn sweep(&self, table: &mut FrameTable, now: Instant) -> usize {
        if table.is_empty() {
            return 0;
        }

        let evicted = table.retain(|frame| frame.idle_for(now) <= self.timeout);
        for frame in &evicted {
            debug!(
                "프레임 {} 타임아웃: {:.1}% 수신 ({}/{} chunks)",
                frame.frame_id(),
                frame.receive_ratio() * 100.0,
                frame.received_count(),
                frame.chunk_count()
            );
        }
        evicted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_table::Apply;

    fn table_with_frame(frame_id: u32, at: Instant) -> FrameTable {
        let mut table = FrameTable::new(1400, 64, usize::MAX);
        let result = table.apply(frame_id, 0, 5, &[0u8; 1400], at).unwrap();
        assert!(matches!(result, Apply::Pending { .. }));
        table
    }

    #[test]
    fn test_boundary_retained_and_evicted() {
        let sweeper = EvictionSweeper::default();
        let start = Instant::now();

        let mut table = table_with_frame(1, start);
        assert_eq!(sweeper.sweep(&mut table, start + Duration::from_millis(499)), 0);
        assert!(table.contains(1));

        assert_eq!(sweeper.sweep(&mut table, start + Duration::from_millis(500)), 0);
        assert!(table.contains(1));

        assert_eq!(sweeper.sweep(&mut table, start + Duration::from_millis(501)), 1);
        assert!(!table.contains(1));
        assert_eq!(table.buffered_bytes(), 0);
    }

    #[test]
    fn test_recent_touch_keeps_frame() {
        let sweeper = EvictionSweeper::default();
        let start = Instant::now();

        let mut table = table_with_frame(1, start);
        table.apply(2, 0, 5, &[0u8; 10], start).unwrap();

        // 프레임 1만 400ms 시점에 갱신
        table.apply(1, 1, 5, &[0u8; 1400], start + Duration::from_millis(400)).unwrap();

        assert_eq!(sweeper.sweep(&mut table, start + Duration::from_millis(600)), 1);
        assert!(table.contains(1));
        assert!(!table.contains(2));
    }

    #[test]
    fn test_custom_timeout() {
        let sweeper = EvictionSweeper::new(Duration::from_millis(50));
        let start = Instant::now();
        let mut table = table_with_frame(7, start);

        assert_eq!(sweeper.sweep(&mut table, start + Duration::from_millis(51)), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_now_before_last_touch_is_not_stale() {
        let sweeper = EvictionSweeper::default();
        let start = Instant::now();
        let mut table = table_with_frame(1, start + Duration::from_secs(1));

        assert_eq!(sweeper.sweep(&mut table, start), 0);
    }
}
