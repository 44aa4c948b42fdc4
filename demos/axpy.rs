// demos/axpy.rs -- batching and scalar parameters.
//
// Runs y += a * x followed by an in-place GELU in a single submission,
// timing the encode and the wait separately.
//
//   cargo run --example axpy

use std::time::Instant;

use gantry::{KernelParam, LaunchContext, LaunchPad};

const N: usize = 1 << 20;

fn main() {
    env_logger::init();

    let mut pad = LaunchPad::new().expect("failed to initialise a GPU device");
    println!("adapter: {}", pad.adapter_info());

    pad.register_kernel("axpy").expect("register axpy");
    pad.register_kernel("gelu").expect("register gelu");

    let mut x = vec![0.5f32; N];
    let mut y = vec![1.0f32; N];
    let x_addr = x.as_mut_ptr() as *mut u8;
    let y_addr = y.as_mut_ptr() as *mut u8;
    // SAFETY: both vectors outlive the pad and are only read again after
    // the waiting commit.
    unsafe {
        pad.register_buffer(x_addr, N * 4).expect("register x");
        pad.register_buffer(y_addr, N * 4).expect("register y");
    }

    let launch = LaunchContext::new((N.div_ceil(64) as u32, 1, 1), (64, 1, 1));

    let t0 = Instant::now();
    pad.dispatch(
        "axpy",
        launch,
        &[
            KernelParam::Buffer(x_addr),
            KernelParam::Buffer(y_addr),
            KernelParam::Float(2.0),
        ],
    )
    .expect("dispatch axpy");
    pad.dispatch("gelu", launch, &[KernelParam::Buffer(y_addr)])
        .expect("dispatch gelu");
    let encoded = t0.elapsed();

    let t1 = Instant::now();
    pad.commit(true).expect("commit");
    let waited = t1.elapsed();

    // y = gelu(1 + 2 * 0.5) = gelu(2.0)
    println!("y[0] = {:.6} (expect ~1.9546)", y[0]);
    println!("encode: {encoded:?}, commit + wait: {waited:?}");
}
