//! Transport handling shared by every subcommand that talks to a real
//! or simulated device: a serial port, a plain file (for replaying a
//! captured stream), or a TCP connection to `stimtool simulate`.
//! Reduced from the reference host tool's `SerialPortArgs`/`SerialPort`
//! pair (which also supports a `--tcp` escape hatch for talking to its
//! own simulator) to this protocol's one baud rate.

use std::io::{Read, Write};

#[derive(clap::Args, Debug, Clone)]
pub struct PortArgs {
    #[arg(default_value_t = default_serial_port())]
    port: String,
    #[arg(short, long, default_value_t = stim_protocol::BAUD_RATE)]
    baud: u32,
    /// Treat `port` as a `host:port` TCP address (for `stimtool simulate`).
    #[arg(long)]
    tcp: bool,
}

#[derive(Debug)]
pub enum Port {
    Serial(Box<dyn serialport::SerialPort>),
    Tcp(std::net::TcpStream),
}

pub fn default_serial_port() -> String {
    if let Ok(infos) = serialport::available_ports() {
        for info in infos {
            return info.port_name.clone();
        }
    }
    "/dev/ttyUSB0".to_owned()
}

impl Read for Port {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.read(buf),
            Self::Tcp(port) => port.read(buf),
        }
    }
}

impl Write for Port {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.write(buf),
            Self::Tcp(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Serial(port) => port.flush(),
            Self::Tcp(port) => port.flush(),
        }
    }
}

impl PortArgs {
    pub fn open(&self) -> anyhow::Result<Port> {
        if self.tcp {
            let port = std::net::TcpStream::connect(&self.port)?;
            Ok(Port::Tcp(port))
        } else {
            let mut port = serialport::new(&self.port, self.baud).open()?;
            port.set_timeout(std::time::Duration::from_secs(2))?;
            Ok(Port::Serial(port))
        }
    }
}
