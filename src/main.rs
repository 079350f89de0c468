use std::error::Error;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crossbeam_channel::unbounded;
use pktcap_driver::{CaptureDriver, ChannelSink, PacketRecord, Settings};

fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings::new()?;

    env_logger::Builder::new()
        .parse_filters(&settings.log_level)
        .init();

    info!("Finding network devices...");
    let devices = CaptureDriver::lookup_devices()?;

    if devices.is_empty() {
        error!("No network devices found. Try running with sudo or as an administrator");
        return Err("No network devices found.".into());
    }

    let device = match &settings.device {
        Some(name) => name.clone(),
        None => select_device(&devices)?,
    };

    let driver = CaptureDriver::new();
    driver.open(
        &device,
        settings.snapshot_length,
        settings.promiscuous,
        settings.timeout_ms,
        settings.filter.as_deref(),
    )?;

    // Packets go to worker threads so the capture loop never waits on printing.
    let (tx, rx) = unbounded::<PacketRecord>();
    let mut worker_handles = Vec::new();
    for i in 0..settings.worker_threads.max(1) {
        let rx_clone = rx.clone();
        let handle = thread::spawn(move || {
            while let Ok(packet) = rx_clone.recv() {
                println!(
                    "[worker {}] {}.{:06} linktype {} len {} caplen {}",
                    i + 1,
                    packet.ts_sec,
                    packet.ts_usec,
                    packet.link_type,
                    packet.wire_length,
                    packet.captured_length
                );
            }
        });
        worker_handles.push(handle);
    }
    drop(rx);

    if let Some(secs) = settings.capture_seconds {
        let stop = driver.stop_handle()?;
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            info!("Capture time of {}s elapsed, stopping.", secs);
            stop.stop();
        });
    }

    println!("\nStarting capture on {}...", device);
    let mut sink = ChannelSink::new(tx);
    match driver.capture(settings.packet_count, &mut sink) {
        Ok(count) => info!("Captured {} packets", count),
        Err(e) => eprintln!("Capture error: {}", e),
    }

    match (driver.received_count(), driver.dropped_count()) {
        (Ok(received), Ok(dropped)) => println!("{} packets received, {} dropped", received, dropped),
        (Err(e), _) | (_, Err(e)) => warn!("Unable to read capture statistics: {}", e),
    }
    driver.close();

    // Closing the channel lets the workers drain and exit.
    drop(sink);
    for handle in worker_handles {
        if handle.join().is_err() {
            error!("Worker thread panicked");
        }
    }

    Ok(())
}

fn select_device(devices: &[String]) -> Result<String, Box<dyn Error>> {
    info!("Available network devices:");
    for (i, device) in devices.iter().enumerate() {
        println!("[{}] {}", i, device);
    }

    loop {
        print!("Enter the number of the device to capture on: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        match input.trim().parse::<usize>() {
            Ok(index) => {
                if let Some(device) = devices.get(index) {
                    return Ok(device.clone());
                } else {
                    eprintln!("Invalid device number. Please try again.");
                }
            }
            Err(_) => {
                eprintln!("Please enter a valid number.");
            }
        }
    }
}
