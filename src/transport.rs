//! 데이터그램 수신 경로
//!
//! 수신은 항상 논블로킹: 대기 중인 데이터그램이 없으면 즉시 `None`.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::info;

use crate::Result;

/// 논블로킹 데이터그램 소스
pub trait Transport {
    /// 대기 중인 데이터그램 하나를 `buf`에 읽고 길이를 반환
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;
}

/// UDP 소켓 기반 수신
pub struct UdpTransport {
    socket: UdpSocket,
    last_peer: Option<SocketAddr>,
}

impl UdpTransport {
    /// 주소에 바인딩
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Listening on {}", socket.local_addr()?);
        Ok(Self::from_socket(socket))
    }

    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            last_peer: None,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 마지막으로 데이터그램을 보낸 송신자
    pub fn last_peer(&self) -> Option<SocketAddr> {
        self.last_peer
    }
}

impl Transport for UdpTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.try_recv_from(buf) {
            Ok((len, peer)) => {
                if self.last_peer != Some(peer) {
                    info!("Receiving stream from {}", peer);
                    self.last_peer = Some(peer);
                }
                Ok(Some(len))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            // 이전 송신에 대한 ICMP 에러 등은 데이터그램이 없는 것으로 취급
            Err(e) if e.kind() == ErrorKind::ConnectionReset => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// 메모리 큐 기반 수신 (재생/테스트용)
impl Transport for VecDeque<Bytes> {
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.pop_front() {
            Some(datagram) => {
                // UDP와 같이 버퍼보다 긴 데이터그램은 잘림
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok(Some(len))
            }
            None => Ok(None),
        }
    }
}
