use std::time::Instant;
use tally_pool::WorkerPoolInner;
use tokio::runtime::Builder;

fn main() {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    rt.block_on(async {
        let now = Instant::now();
        let pool = WorkerPoolInner::new(5).unwrap();

        for i in 0..6 {
            let value = pool.submit(move || f64::from(i * 2)).await.unwrap();
            let tally = pool.tally().await;
            println!(
                "task {i} -> {value}, running sum: {}, count: {}",
                tally.sum, tally.count
            );
        }

        match pool.average().await {
            Ok(avg) => println!("average: {avg}"),
            Err(err) => println!("no average: {err}"),
        }

        pool.shutdown().await.unwrap();
        println!("elapsed: {:?}", now.elapsed());
    });
}
