use chrono::{DateTime, TimeDelta, Utc};
use core::net::{IpAddr, SocketAddr};
use embassy_net::{Stack, udp::UdpSocket};
use embassy_time::{Duration, Instant, Timer};
use log::{info, warn};
use smoltcp::{storage::PacketMetadata, wire::DnsQueryType};
use sntpc::{NtpContext, NtpTimestampGenerator, get_time};

use crate::{error::NetError, error::SysError, io::rtc::set_time};

const NTP_SERVER: &str = "pool.ntp.org";

#[derive(Copy, Clone)]
struct Timestamp {
    duration: Duration,
    offset: DateTime<Utc>,
}

impl Timestamp {
    fn new(offset: DateTime<Utc>) -> Timestamp {
        Timestamp {
            duration: Duration::default(),
            offset,
        }
    }
}

impl NtpTimestampGenerator for Timestamp {
    fn init(&mut self) {
        self.duration = Duration::from_micros(
            (self.offset + TimeDelta::milliseconds(Instant::now().as_millis() as i64))
                .timestamp_micros() as u64,
        );
    }

    fn timestamp_sec(&self) -> u64 {
        self.duration.as_secs()
    }

    fn timestamp_subsec_micros(&self) -> u32 {
        (self.duration.as_micros() - self.duration.as_secs() * 1000000) as u32
    }
}

pub struct NtpClient {
    stack: Stack<'static>,
    context: NtpContext<Timestamp>,
}

impl NtpClient {
    pub fn new(stack: Stack<'static>) -> NtpClient {
        NtpClient {
            stack,
            context: NtpContext::new(Timestamp::new(DateTime::from_timestamp_nanos(0))),
        }
    }

    /// One NTP exchange; on success the RTC is set to the server time.
    pub async fn sync(&self) -> Result<(), SysError> {
        let mut udp_rx_meta = [PacketMetadata::EMPTY; 16];
        let mut udp_rx_buffer = [0; 1024];
        let mut udp_tx_meta = [PacketMetadata::EMPTY; 16];
        let mut udp_tx_buffer = [0; 1024];

        let mut socket = UdpSocket::new(
            self.stack,
            &mut udp_rx_meta,
            &mut udp_rx_buffer,
            &mut udp_tx_meta,
            &mut udp_tx_buffer,
        );

        socket.bind(123).map_err(|_| NetError::Bind)?;

        let ntp_addrs = self
            .stack
            .dns_query(NTP_SERVER, DnsQueryType::A)
            .await
            .map_err(|_| NetError::Dns)?;
        let addr: IpAddr = (*ntp_addrs.first().ok_or(NetError::Dns)?).into();

        let result = get_time(SocketAddr::from((addr, 123)), &socket, self.context).await;

        match result {
            Ok(time) => {
                let datetime = DateTime::from_timestamp(
                    time.sec().into(),
                    (time.sec_fraction() as u64 * 1_000_000_000 / 4_294_967_296) as u32,
                )
                .ok_or(NetError::Ntp)?;

                Ok(set_time(datetime.timestamp_micros() as u64).await?)
            }
            Err(e) => {
                warn!("ntp: exchange failed: {:?}", e);
                Err(NetError::Ntp.into())
            }
        }
    }
}

const NTP_REFRESH_TIME: Duration = Duration::from_secs(3600);

#[embassy_executor::task]
pub async fn ntp_task(client: NtpClient) {
    loop {
        match client.sync().await {
            Ok(()) => info!("ntp: clock synced"),
            Err(_) => warn!("ntp: sync failed, keeping the old clock"),
        }
        Timer::after(NTP_REFRESH_TIME).await;
    }
}
