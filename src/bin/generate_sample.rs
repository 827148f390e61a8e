use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use rusty_cd::{CdSpectrum, ParseOptions};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn decimal_comma(v: f64) -> String {
    format!("{v:.4}").replace('.', ",")
}

/// An α-helical CD spectrum, 260 → 180 nm, with HT rising at short wavelengths.
fn render_export(rng: &mut SimpleRng) -> String {
    let wavelengths: Vec<f64> = (0..=80).map(|i| 260.0 - i as f64).collect();

    let mut text = String::new();
    text.push_str("TITLE;Synthetic helical peptide\n");
    text.push_str("DATA TYPE;\nORIGIN;JASCO\nSPECTROMETER/DATA SYSTEM;J-815\n");
    text.push_str("DELTAX;-1\nXUNITS;NANOMETERS\nYUNITS;CD [mdeg]\nY2UNITS;HT [V]\n");
    let _ = writeln!(text, "NPOINTS;{}", wavelengths.len());
    text.push_str("XYDATA\n");

    for &wl in &wavelengths {
        let cd = gaussian(wl, 192.0, 5.0, 60.0)
            - gaussian(wl, 208.0, 6.0, 30.0)
            - gaussian(wl, 222.0, 8.0, 28.0)
            + rng.gauss(0.0, 0.3);
        let ht = 220.0 + 900.0 * (-(wl - 180.0) / 12.0).exp();
        let _ = writeln!(text, "{};{};{}", wl, decimal_comma(cd), decimal_comma(ht));
    }

    text.push_str("\n##### Extended Information\n[Measurement Information]\n");
    text.push_str("Data pitch;1 nm\nBandwidth;1 nm\nScanning speed;50 nm/min\n");
    text
}

fn main() -> Result<()> {
    env_logger::init();

    let mut rng = SimpleRng::new(42);
    let output_path = Path::new("sample_cd.csv");
    std::fs::write(output_path, render_export(&mut rng)).context("writing sample export")?;
    info!("wrote {}", output_path.display());

    let mut cd = CdSpectrum::load_with(output_path, &ParseOptions::default())
        .context("parsing the generated export")?;
    let _ = cd.reliability_filter();
    let helix = cd.integrate(215.0, 225.0).context("integrating 215-225 nm")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&cd.header).context("serializing header")?
    );
    println!(
        "Wrote {} points to {}; {} pass HT <= {}; integral 215-225 nm = {helix:.3}",
        cd.domain_raw().len(),
        output_path.display(),
        cd.domain().len(),
        cd.ht_max()
    );
    Ok(())
}
