//! 디코더/렌더러 협력자
//!
//! 재조립 엔진은 완성된 바이트 버퍼를 디코더에 넘기는 것으로 끝난다.
//! 실제 코덱과 화면 출력은 이 트레이트 뒤에 숨는다.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{Error, FrameId, Result};

/// 디코더
pub trait Decoder {
    type Image;

    /// 새 코덱 설정 (디코딩 상태 리셋)
    fn submit_extradata(&mut self, extradata: Bytes) -> Result<()>;

    /// 프레임 제출
    ///
    /// 디코더는 내부에 버퍼링할 수 있으므로 제출 한 번에 0개 이상의 이미지를 돌려준다.
    fn submit_frame(&mut self, frame_id: FrameId, data: Bytes) -> Result<Vec<Self::Image>>;
}

/// 렌더러
pub trait Renderer<I> {
    fn present(&mut self, image: I) -> Result<()>;
}

/// 디코딩 결과 (패스스루에서는 인코딩된 바이트 그대로)
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub frame_id: FrameId,

    /// 이 프레임 직전에 적용된 새 코덱 설정
    pub config: Option<Bytes>,

    pub data: Bytes,
}

/// 패스스루 디코더
///
/// 프레임 하나당 이미지 하나를 돌려준다. 새 extradata는 다음 이미지에 실려
/// 스트림 덤프가 설정 변경 지점을 보존하도록 한다.
#[derive(Debug, Default)]
pub struct PassthroughDecoder {
    extradata: Option<Bytes>,
    pending_config: Option<Bytes>,
    require_extradata: bool,
}

impl PassthroughDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// extradata를 받기 전의 프레임은 거부
    pub fn requiring_extradata() -> Self {
        Self {
            require_extradata: true,
            ..Self::default()
        }
    }

    pub fn extradata(&self) -> Option<&Bytes> {
        self.extradata.as_ref()
    }
}

impl Decoder for PassthroughDecoder {
    type Image = Picture;

    fn submit_extradata(&mut self, extradata: Bytes) -> Result<()> {
        debug!("디코더 설정 리셋: {} bytes", extradata.len());
        self.pending_config = Some(extradata.clone());
        self.extradata = Some(extradata);
        Ok(())
    }

    fn submit_frame(&mut self, frame_id: FrameId, data: Bytes) -> Result<Vec<Picture>> {
        if self.require_extradata && self.extradata.is_none() {
            return Err(Error::Decoder(format!("frame {} before extradata", frame_id)));
        }

        Ok(vec![Picture {
            frame_id,
            config: self.pending_config.take(),
            data,
        }])
    }
}

/// 출력 없는 렌더러 (표시 수만 집계)
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub presented: u64,
}

impl<I> Renderer<I> for NullRenderer {
    fn present(&mut self, _image: I) -> Result<()> {
        self.presented += 1;
        Ok(())
    }
}

/// 엘리멘터리 스트림 덤프
///
/// 설정과 프레임 바이트를 도착 순서대로 파일에 이어 쓴다.
pub struct StreamWriter {
    writer: BufWriter<File>,
    frames: u64,
    bytes: u64,
}

impl StreamWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        info!("Writing stream to {:?}", path.as_ref());
        Ok(Self {
            writer: BufWriter::new(file),
            frames: 0,
            bytes: 0,
        })
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Renderer<Picture> for StreamWriter {
    fn present(&mut self, picture: Picture) -> Result<()> {
        if let Some(config) = &picture.config {
            self.writer.write_all(config)?;
            self.bytes += config.len() as u64;
        }
        self.writer.write_all(&picture.data)?;
        self.bytes += picture.data.len() as u64;
        self.frames += 1;
        Ok(())
    }
}

/// 다른 태스크로 이미지를 넘기는 렌더러
///
/// `try_send`만 사용하므로 루프를 막지 않는다. 채널이 가득 차면 해당
/// 이미지는 버려지고 에러로 보고된다.
pub struct ChannelRenderer<I> {
    tx: mpsc::Sender<I>,
}

impl<I> ChannelRenderer<I> {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<I>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl<I> Renderer<I> for ChannelRenderer<I> {
    fn present(&mut self, image: I) -> Result<()> {
        self.tx.try_send(image).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::Render("display queue full".into()),
            mpsc::error::TrySendError::Closed(_) => Error::ChannelError,
        })
    }
}
