//! 와이어 포맷 파싱
//!
//! 데이터그램 구조 (빅엔디안):
//! ```text
//! offset 0     : type         (1 byte)  0 = FRAME, 1 = EXTRADATA
//! offset 1..4  : frame_id     (4 bytes)
//! offset 5..6  : chunk_index  (2 bytes)
//! offset 7..8  : chunk_count  (2 bytes)
//! offset 9..   : payload      (<= C_MAX bytes)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Error, FrameId, Result, HEADER_SIZE};

/// 패킷 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// 비디오 프레임 청크
    Frame = 0,

    /// 코덱 설정 (extradata) 청크
    Extradata = 1,
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PacketType::Frame),
            1 => Ok(PacketType::Extradata),
            other => Err(Error::UnknownPacketType(other)),
        }
    }
}

/// 청크 헤더 (고정 9바이트)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub packet_type: PacketType,
    pub frame_id: FrameId,
    /// 0부터 시작하는 청크 인덱스
    pub chunk_index: u16,
    /// 이 논리 단위의 전체 청크 수
    pub chunk_count: u16,
}

impl ChunkHeader {
    pub fn new(packet_type: PacketType, frame_id: FrameId, chunk_index: u16, chunk_count: u16) -> Self {
        Self {
            packet_type,
            frame_id,
            chunk_index,
            chunk_count,
        }
    }

    /// 헤더 기록
    pub fn encode_into<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.packet_type as u8);
        buf.put_u32(self.frame_id);
        buf.put_u16(self.chunk_index);
        buf.put_u16(self.chunk_count);
    }

    /// 헤더 + 페이로드로 데이터그램 생성
    pub fn to_datagram(&self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        self.encode_into(&mut buf);
        buf.extend_from_slice(payload);
        buf.freeze()
    }
}

/// 파싱된 데이터그램 (페이로드는 원본 버퍼를 빌림)
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    pub header: ChunkHeader,
    pub payload: &'a [u8],
}

impl<'a> PacketView<'a> {
    /// 데이터그램 파싱
    ///
    /// 헤더보다 짧거나 청크 인덱스가 범위를 벗어나면 `MalformedPacket`,
    /// 타입 바이트를 모르면 `UnknownPacketType`.
    pub fn parse(datagram: &'a [u8]) -> Result<Self> {
        if datagram.len() < HEADER_SIZE {
            return Err(Error::malformed("datagram shorter than header"));
        }

        let mut cursor = datagram;
        let packet_type = PacketType::try_from(cursor.get_u8())?;
        let frame_id = cursor.get_u32();
        let chunk_index = cursor.get_u16();
        let chunk_count = cursor.get_u16();

        if chunk_count == 0 {
            return Err(Error::malformed("chunk_count is zero"));
        }
        if chunk_index >= chunk_count {
            return Err(Error::malformed("chunk_index out of range"));
        }

        Ok(Self {
            header: ChunkHeader {
                packet_type,
                frame_id,
                chunk_index,
                chunk_count,
            },
            payload: cursor,
        })
    }

    /// 페이로드 길이 검증 (C_MAX 초과 시 슬롯을 침범하므로 거부)
    pub fn validate(&self, max_payload: usize) -> Result<()> {
        if self.payload.len() > max_payload {
            return Err(Error::malformed("payload exceeds chunk size"));
        }
        Ok(())
    }

    pub fn packet_type(&self) -> PacketType {
        self.header.packet_type
    }

    pub fn frame_id(&self) -> FrameId {
        self.header.frame_id
    }

    pub fn chunk_index(&self) -> u16 {
        self.header.chunk_index
    }

    pub fn chunk_count(&self) -> u16 {
        self.header.chunk_count
    }
}
