use fibre_readthrough::{Cache, CacheBuilder, CacheKey, MemoryCache, MultiKeyCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Customer {
  id: u64,
  email: String,
}

// Stands in for a slow database query.
fn load_price(sku: &str, queries: &AtomicUsize) -> u64 {
  queries.fetch_add(1, Ordering::SeqCst);
  thread::sleep(Duration::from_millis(200));
  sku.len() as u64 * 100
}

fn main() {
  let prices = Arc::new(
    CacheBuilder::<String, u64>::default()
      .name("prices")
      .build()
      .expect("Failed to build cache"),
  );
  let queries = Arc::new(AtomicUsize::new(0));

  println!("Ten threads ask for the same uncached price at once...");
  let handles: Vec<_> = (0..10)
    .map(|_| {
      let prices = prices.clone();
      let queries = queries.clone();
      thread::spawn(move || {
        prices.get_with(&"sku-123".to_string(), |sku| load_price(sku, &queries))
      })
    })
    .collect();
  for handle in handles {
    println!("  got price {}", handle.join().unwrap());
  }
  println!("Database queries run: {}", queries.load(Ordering::SeqCst));

  println!("\nBatch lookup with one key already cached:");
  let skus: Vec<String> = ["sku-1", "sku-123", "sku-77"].iter().map(|s| s.to_string()).collect();
  let batch = prices
    .get_all_with(&skus, |uncached| {
      println!("  loading only {:?}", uncached);
      uncached
        .iter()
        .map(|sku| (sku.clone(), sku.len() as u64 * 100))
        .collect::<Vec<_>>()
    })
    .expect("batch lookup failed");
  for (sku, price) in &batch {
    println!("  {} => {}", sku, price);
  }

  println!("\nCache metrics: {:#?}", prices.metrics());

  println!("\nMulti-key cache: store a customer once, find it by id or email.");
  let customers = MultiKeyCache::new(
    MemoryCache::<CacheKey<String>, Customer>::new("customers"),
    ["id", "email"],
    |property: &str, customer: &Customer| match property {
      "id" => Some(customer.id.to_string()),
      "email" => Some(customer.email.clone()),
      _ => None,
    },
  );
  customers.put(Customer {
    id: 42,
    email: "ada@example.com".to_string(),
  });
  println!(
    "  by email: {:?}",
    customers.get("email", &"ada@example.com".to_string()).into_value()
  );
  println!("  by id:    {:?}", customers.get("id", &"42".to_string()).into_value());
  println!("  entries stored: {}", customers.backing().len());

  prices.remove_all();
  println!(
    "\nAfter remove_all, sku-123 present: {}",
    prices.get(&"sku-123".to_string()).is_present()
  );
}
