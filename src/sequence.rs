//! 프레임 순서 추적과 손실 집계
//!
//! 두 갱신 경로는 서로 독립이다:
//! - `observe`: FRAME 청크가 들어올 때마다 호출, 앞으로 건너뛴 만큼을 드롭으로 집계
//! - `advance_on_render`: 디코딩 결과가 실제로 표시된 뒤에만 호출
//!
//! 조립 중인 더 낮은 frame_id가 나중에 완료되더라도 이미 집계된 드롭은 되돌리지 않는다.

use tracing::trace;

use crate::FrameId;

/// 순서 추적기
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    /// 제시간으로 간주하는 다음 frame_id
    expected_frame_id: FrameId,

    /// 누적 드롭 프레임 수
    dropped_count: u64,
}

impl SequenceTracker {
    pub fn new(initial_frame_id: FrameId) -> Self {
        Self {
            expected_frame_id: initial_frame_id,
            dropped_count: 0,
        }
    }

    /// FRAME 청크 관측 (조립 전에 호출)
    ///
    /// 새로 집계된 드롭 수를 반환한다.
    pub fn observe(&mut self, frame_id: FrameId) -> u64 {
        if frame_id <= self.expected_frame_id {
            return 0;
        }

        let gap = (frame_id - self.expected_frame_id) as u64;
        trace!(
            "frame_id 간격 감지: expected={}, got={}, gap={}",
            self.expected_frame_id,
            frame_id,
            gap
        );
        self.dropped_count += gap;
        self.expected_frame_id = frame_id;
        gap
    }

    /// 프레임 표시 완료 후 기대값 전진
    pub fn advance_on_render(&mut self, frame_id: FrameId) {
        self.expected_frame_id = self.expected_frame_id.max(frame_id.saturating_add(1));
    }

    pub fn expected_frame_id(&self) -> FrameId {
        self.expected_frame_id
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_counts_skipped_frames() {
        // 1, 2는 표시까지 끝났고 3은 아직 조립 중일 때 7의 청크가 도착
        let mut tracker = SequenceTracker::new(1);
        tracker.observe(1);
        tracker.advance_on_render(1);
        tracker.observe(2);
        tracker.advance_on_render(2);
        tracker.observe(3);
        tracker.observe(7);

        assert_eq!(tracker.dropped_count(), 4);
        assert_eq!(tracker.expected_frame_id(), 7);

        // 3이 뒤늦게 표시되어도 집계된 드롭은 그대로
        tracker.advance_on_render(3);
        assert_eq!(tracker.dropped_count(), 4);
        assert_eq!(tracker.expected_frame_id(), 7);
    }

    #[test]
    fn test_observe_only_counts_every_forward_step() {
        // 표시 없이 관측만 하면 한 칸 전진도 드롭으로 집계됨
        let mut tracker = SequenceTracker::new(1);
        for frame_id in [1, 2, 3, 7] {
            tracker.observe(frame_id);
        }
        assert_eq!(tracker.expected_frame_id(), 7);
        assert_eq!(tracker.dropped_count(), 1 + 1 + 4);
    }

    #[test]
    fn test_gap_from_expected_only() {
        // 렌더가 매번 기대값을 전진시키면 연속 프레임은 드롭이 아님
        let mut tracker = SequenceTracker::new(1);
        for frame_id in [1, 2, 3] {
            tracker.observe(frame_id);
            tracker.advance_on_render(frame_id);
        }
        assert_eq!(tracker.dropped_count(), 0);
        assert_eq!(tracker.expected_frame_id(), 4);

        assert_eq!(tracker.observe(7), 3);
        assert_eq!(tracker.expected_frame_id(), 7);
    }

    #[test]
    fn test_backward_and_repeated_ids_ignored() {
        let mut tracker = SequenceTracker::new(10);
        assert_eq!(tracker.observe(4), 0);
        assert_eq!(tracker.observe(10), 0);
        assert_eq!(tracker.expected_frame_id(), 10);
        assert_eq!(tracker.dropped_count(), 0);
    }

    #[test]
    fn test_render_never_moves_backwards() {
        let mut tracker = SequenceTracker::new(0);
        tracker.observe(20);
        tracker.advance_on_render(5);
        assert_eq!(tracker.expected_frame_id(), 20);

        tracker.advance_on_render(20);
        assert_eq!(tracker.expected_frame_id(), 21);

        tracker.advance_on_render(u32::MAX);
        assert_eq!(tracker.expected_frame_id(), u32::MAX);
    }
}
