// demos/increment.rs -- smallest possible launch pad round trip.
//
// Registers a float buffer backed by an ordinary Vec, runs the
// `increment` kernel over it, waits, and prints the result.
//
//   cargo run --example increment

use gantry::{KernelParam, LaunchContext, LaunchPad};

fn main() {
    env_logger::init();

    let mut pad = LaunchPad::new().expect("failed to initialise a GPU device");
    println!("{pad}");

    pad.register_kernel("increment").expect("register increment");

    let mut data: Vec<f32> = (0..8).map(|i| i as f32).collect();
    println!("before: {data:?}");

    let addr = data.as_mut_ptr() as *mut u8;
    // SAFETY: `data` outlives the pad and is not touched again until
    // after the waiting commit below.
    unsafe { pad.register_buffer(addr, data.len() * 4) }.expect("register buffer");

    pad.dispatch(
        "increment",
        LaunchContext::new((data.len() as u32, 1, 1), (1, 1, 1)),
        &[KernelParam::Buffer(addr)],
    )
    .expect("dispatch");
    pad.commit(true).expect("commit");

    println!("after:  {data:?}");
}
