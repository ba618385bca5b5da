//! `stimtool dump`: read one channel's 64-byte register block over the
//! wire and print it both as a hexdump and as its named fields.

use chan_block::{ChannelBlock, Channel, Group, BASE_A, BASE_B, BLOCK_LEN};

use crate::client::DeviceClient;

#[derive(clap::Args, Debug)]
pub struct DumpOpts {
    #[command(flatten)]
    port: crate::common::PortArgs,
    /// Which channel's block to dump.
    #[arg(value_enum, default_value_t = ChannelArg::A)]
    channel: ChannelArg,
    /// Caller-chosen host key for the key exchange.
    #[arg(long, default_value_t = 0x42)]
    host_key: u8,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ChannelArg {
    A,
    B,
}

impl crate::ToolRun for DumpOpts {
    fn run(&self) -> anyhow::Result<()> {
        let port = self.port.open()?;
        let mut client = DeviceClient::new(port);
        client.handshake()?;
        client.key_exchange(self.host_key)?;

        let (channel, base) = match self.channel {
            ChannelArg::A => (Channel::A, BASE_A + 0x4000),
            ChannelArg::B => (Channel::B, BASE_B + 0x4000),
        };

        let mut block = ChannelBlock::zeroed();
        for offset in 0..BLOCK_LEN as u16 {
            let byte = client.read(base + offset)?;
            block.set(offset as u8, byte);
        }

        println!("channel {:?}:", channel);
        crate::hexdump::hexdump(block.as_bytes());
        println!();
        println!("gate_value        = {:#04x}", block.gate_value().into_bits());
        println!("output_ctrl_flags = {:#04x}", block.output_control_flags());
        println!("apply_channel     = {:#04x}", block.apply_channel_mask());
        for group in Group::ALL {
            let g = block.group(group);
            println!(
                "{group:?}: value={:>3} min={:>3} max={:>3} rate={:>3} step={:>3} select={:#04x}",
                g.value(),
                g.min(),
                g.max(),
                g.rate(),
                g.step(),
                g.select().into_bits(),
            );
        }

        Ok(())
    }
}
