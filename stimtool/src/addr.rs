//! `stimtool read`/`stimtool write`: one-shot register access against
//! the device's virtual address space (spec §6).

use crate::client::DeviceClient;

#[derive(clap::Args, Debug)]
pub struct ReadOpts {
    #[command(flatten)]
    port: crate::common::PortArgs,
    /// Virtual address to read, e.g. `0x407b` for the current mode.
    #[arg(value_parser = parse_addr)]
    addr: u16,
    #[arg(long, default_value_t = 0x42)]
    host_key: u8,
}

#[derive(clap::Args, Debug)]
pub struct WriteOpts {
    #[command(flatten)]
    port: crate::common::PortArgs,
    #[arg(value_parser = parse_addr)]
    addr: u16,
    /// One or more data bytes (at most `MAX_WRITE_LEN`), e.g. `0x10`.
    #[arg(value_parser = parse_byte, required = true)]
    data: Vec<u8>,
    #[arg(long, default_value_t = 0x42)]
    host_key: u8,
}

fn parse_addr(s: &str) -> Result<u16, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

fn parse_byte(s: &str) -> Result<u8, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

impl crate::ToolRun for ReadOpts {
    fn run(&self) -> anyhow::Result<()> {
        let port = self.port.open()?;
        let mut client = DeviceClient::new(port);
        client.handshake()?;
        client.key_exchange(self.host_key)?;
        let value = client.read(self.addr)?;
        println!("{:#06x} = {:#04x}", self.addr, value);
        Ok(())
    }
}

impl crate::ToolRun for WriteOpts {
    fn run(&self) -> anyhow::Result<()> {
        let port = self.port.open()?;
        let mut client = DeviceClient::new(port);
        client.handshake()?;
        client.key_exchange(self.host_key)?;
        client.write(self.addr, &self.data)?;
        println!("wrote {} byte(s) at {:#06x}", self.data.len(), self.addr);
        Ok(())
    }
}
