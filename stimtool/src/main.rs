//! Host CLI for the stimulation box: talk to a real device over its
//! serial protocol, or stand up an in-process simulator, all against
//! the same `stim-protocol`/`stim-firmware` code the device itself
//! runs. Subcommand dispatch is modeled on the reference host tool's
//! flat `clap::Subcommand` + `ToolRun` trait pair.

mod addr;
mod client;
mod common;
mod dump;
mod hexdump;
mod set_mode;
mod simulate;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()>;
}

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct ToolOptions {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    ListPorts(ListPortsOpts),
    Read(addr::ReadOpts),
    Write(addr::WriteOpts),
    Dump(dump::DumpOpts),
    SetMode(set_mode::SetModeOpts),
    BoxCommand(set_mode::BoxCommandOpts),
    Simulate(simulate::SimulateOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            ListPorts(o) => o.run(),
            Read(o) => o.run(),
            Write(o) => o.run(),
            Dump(o) => o.run(),
            SetMode(o) => o.run(),
            BoxCommand(o) => o.run(),
            Simulate(o) => o.run(),
        }
    }
}

#[derive(clap::Args, Debug)]
struct ListPortsOpts;

impl ToolRun for ListPortsOpts {
    fn run(&self) -> anyhow::Result<()> {
        for port in serialport::available_ports()? {
            if port.port_name == common::default_serial_port() {
                println!("* {}", port.port_name);
            } else {
                println!("  {}", port.port_name);
            }
            if let serialport::SerialPortType::UsbPort(usb) = port.port_type {
                println!("    - USB {:x}:{:x}", usb.vid, usb.pid);
                if let Some(serial_number) = usb.serial_number {
                    println!("    - S/N: {}", serial_number);
                }
            }
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;
    let opts = ToolOptions::parse();
    opts.command.run()
}
