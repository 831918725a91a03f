use fcrypt_crypto::{
    decrypt_stream_authenticated, encrypt_stream_authenticated, TailReader, HMAC_TAG_SIZE,
};
use std::io::Read;

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

const ENC_KEY: [u8; 16] = [0x01; 16];
const MAC_KEY: [u8; 32] = [0x02; 32];
const IV: [u8; 16] = [0x03; 16];

#[divan::bench(args = [65536, 1048576, 16777216])]
fn bench_encrypt_stream(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            let mut out = Vec::with_capacity(size + HMAC_TAG_SIZE);
            encrypt_stream_authenticated(
                divan::black_box(&ENC_KEY),
                &IV,
                &MAC_KEY,
                divan::black_box(&data[..]),
                &mut out,
            )
            .unwrap();
            out
        });
}

#[divan::bench(args = [65536, 1048576, 16777216])]
fn bench_decrypt_stream(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    let mut ciphertext = Vec::with_capacity(size + HMAC_TAG_SIZE);
    encrypt_stream_authenticated(&ENC_KEY, &IV, &MAC_KEY, &data[..], &mut ciphertext).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            let mut out = Vec::with_capacity(size);
            decrypt_stream_authenticated(
                divan::black_box(&ENC_KEY),
                &IV,
                &MAC_KEY,
                divan::black_box(&ciphertext[..]),
                &mut out,
            )
            .unwrap();
            out
        });
}

#[divan::bench(args = [1024, 16384, 262144])]
fn bench_tail_reader(bencher: divan::Bencher, chunk: usize) {
    let data = make_data(4 * 1024 * 1024);
    bencher
        .counter(divan::counter::BytesCount::new(data.len()))
        .bench(|| {
            let mut reader = TailReader::new(divan::black_box(&data[..]), 64);
            let mut buf = vec![0u8; chunk];
            let mut total = 0usize;
            loop {
                let n = reader.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                total += n;
            }
            total
        });
}

fn main() {
    divan::main();
}
