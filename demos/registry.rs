use {
    rotatelog::{Registry, RegistryOptions, Stream},
    std::{io::Write, time::Duration},
};

fn handle_request(registry: &Registry, id: u32) -> std::io::Result<()> {
    writeln!(registry.get(Stream::Request), "request {id} received")?;
    writeln!(registry.get(Stream::Call), "request {id} called upstream")?;
    if id % 3 == 0 {
        writeln!(registry.get(Stream::Error), "request {id} failed")?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::open(
        "./logs/service-",
        &RegistryOptions {
            period: Duration::from_secs(60),
            ..RegistryOptions::default()
        },
    )?;

    for id in 1..=10 {
        handle_request(&registry, id)?;
    }
    for (stream, log) in registry.iter() {
        writeln!(registry.get(Stream::Debug), "{stream} -> {:?}", log.current_path())?;
    }

    registry.close()?;
    Ok(())
}
