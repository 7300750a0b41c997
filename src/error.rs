//! 에러 타입 정의

use thiserror::Error;

/// VFR 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("잘못된 패킷: {reason}")]
    MalformedPacket { reason: &'static str },

    #[error("알 수 없는 패킷 타입: {0}")]
    UnknownPacketType(u8),

    #[error("대기 프레임 한도 초과: limit={limit}")]
    PendingLimitReached { limit: usize },

    #[error("버퍼 오버플로우: 최대 크기 {max_size} 초과")]
    BufferOverflow { max_size: usize },

    #[error("버퍼 할당 실패: frame_id={frame_id}, bytes={bytes}")]
    Allocation { frame_id: u32, bytes: usize },

    #[error("extradata 버퍼 할당 실패: bytes={bytes}")]
    ExtradataAllocation { bytes: usize },

    #[error("디코더 에러: {0}")]
    Decoder(String),

    #[error("렌더 에러: {0}")]
    Render(String),

    #[error("채널 에러")]
    ChannelError,
}

impl Error {
    pub(crate) fn malformed(reason: &'static str) -> Self {
        Error::MalformedPacket { reason }
    }

    /// 데이터그램 하나만 버리면 되는 에러인지 여부
    pub fn is_per_datagram(&self) -> bool {
        matches!(
            self,
            Error::MalformedPacket { .. }
                | Error::UnknownPacketType(_)
                | Error::PendingLimitReached { .. }
                | Error::BufferOverflow { .. }
                | Error::Allocation { .. }
                | Error::ExtradataAllocation { .. }
        )
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
