//! Command-line demo of the matching engine, generalizing the teacher's
//! single-shot `cli.rs` from one order type to the full lattice.

use clap::{Parser, Subcommand, ValueEnum};

use crate::book::OrderBook;
use crate::event::EventObserver;
use crate::order::{Order, Side, TimeInForce};

#[derive(Parser)]
#[command(name = "engine-cli")]
#[command(author = "Andrew Odiit", version = "0.1", about = "A demo of a limit order book engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for Side {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Buy => Side::Buy,
            SideArg::Sell => Side::Sell,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TifArg {
    Gtc,
    Ioc,
    Aon,
    Fok,
}

impl From<TifArg> for TimeInForce {
    fn from(value: TifArg) -> Self {
        match value {
            TifArg::Gtc => TimeInForce::Gtc,
            TifArg::Ioc => TimeInForce::Ioc,
            TifArg::Aon => TimeInForce::Aon,
            TifArg::Fok => TimeInForce::Fok,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a market order
    Market {
        #[arg(value_enum)]
        side: SideArg,
        quantity: u64,
        #[arg(long, value_enum, default_value = "ioc")]
        tif: TifArg,
    },
    /// Submit a limit order
    Limit {
        #[arg(value_enum)]
        side: SideArg,
        price: u64,
        quantity: u64,
        #[arg(long, value_enum, default_value = "gtc")]
        tif: TifArg,
    },
    /// Submit a stop order (converts to market once triggered)
    Stop {
        #[arg(value_enum)]
        side: SideArg,
        stop_price: u64,
        quantity: u64,
        #[arg(long, value_enum, default_value = "gtc")]
        tif: TifArg,
    },
    /// Submit a stop-limit order (converts to limit once triggered)
    StopLimit {
        #[arg(value_enum)]
        side: SideArg,
        price: u64,
        stop_price: u64,
        quantity: u64,
        #[arg(long, value_enum, default_value = "gtc")]
        tif: TifArg,
    },
    /// Submit a trailing-stop order
    TrailingStop {
        #[arg(value_enum)]
        side: SideArg,
        trail_amount: u64,
        quantity: u64,
        #[arg(long, value_enum, default_value = "gtc")]
        tif: TifArg,
    },
    /// Submit a trailing-stop-limit order
    TrailingStopLimit {
        #[arg(value_enum)]
        side: SideArg,
        price: u64,
        trail_amount: u64,
        quantity: u64,
        #[arg(long, value_enum, default_value = "gtc")]
        tif: TifArg,
    },
    /// Cancel down to (or entirely below) a new quantity
    Cancel { order_id: u64, new_quantity: u64 },
    /// Remove a resting order outright
    Delete { order_id: u64 },
    /// Force-execute a resting order, bypassing normal matching
    Execute {
        order_id: u64,
        quantity: u64,
        price: Option<u64>,
    },
    /// Print the current state of the book
    Book,
}

/// Prints every event to stdout as it happens.
struct ConsoleObserver;

impl EventObserver for ConsoleObserver {
    fn on_order_added(&mut self, order: &Order) {
        println!("order added: {order:?}");
    }

    fn on_order_deleted(&mut self, order: &Order) {
        println!("order deleted: id={}", order.id);
    }

    fn on_order_updated(&mut self, order: &Order) {
        println!("order updated: id={} stop_price={}", order.id, order.stop_price);
    }

    fn on_order_executed(&mut self, order: &Order) {
        println!(
            "order executed: id={} price={} quantity={}",
            order.id, order.last_executed_price, order.last_executed_quantity
        );
    }
}

const DEMO_SYMBOL_ID: u32 = 1;

pub fn run_cli() {
    let cli = Cli::parse();
    let mut book = OrderBook::new(DEMO_SYMBOL_ID);
    let mut observer = ConsoleObserver;
    let next_id: u64 = 1;

    let result = match cli.command {
        Commands::Market { side, quantity, tif } => {
            let order =
                Order::market(next_id, DEMO_SYMBOL_ID, side.into(), quantity, tif.into(), 0);
            submit(&mut book, &mut observer, order)
        }
        Commands::Limit { side, price, quantity, tif } => {
            let order = Order::limit(
                next_id,
                DEMO_SYMBOL_ID,
                side.into(),
                price,
                quantity,
                tif.into(),
                0,
            );
            submit(&mut book, &mut observer, order)
        }
        Commands::Stop { side, stop_price, quantity, tif } => {
            let order = Order::stop(
                next_id,
                DEMO_SYMBOL_ID,
                side.into(),
                stop_price,
                quantity,
                tif.into(),
                0,
            );
            submit(&mut book, &mut observer, order)
        }
        Commands::StopLimit { side, price, stop_price, quantity, tif } => {
            let order = Order::stop_limit(
                next_id,
                DEMO_SYMBOL_ID,
                side.into(),
                price,
                stop_price,
                quantity,
                tif.into(),
                0,
            );
            submit(&mut book, &mut observer, order)
        }
        Commands::TrailingStop { side, trail_amount, quantity, tif } => {
            let order = Order::trailing_stop(
                next_id,
                DEMO_SYMBOL_ID,
                side.into(),
                trail_amount,
                quantity,
                tif.into(),
                0,
            );
            submit(&mut book, &mut observer, order)
        }
        Commands::TrailingStopLimit { side, price, trail_amount, quantity, tif } => {
            let order = Order::trailing_stop_limit(
                next_id,
                DEMO_SYMBOL_ID,
                side.into(),
                price,
                trail_amount,
                quantity,
                tif.into(),
                0,
            );
            submit(&mut book, &mut observer, order)
        }
        Commands::Cancel { order_id, new_quantity } => {
            book.cancel_order(order_id, new_quantity, &mut observer)
        }
        Commands::Delete { order_id } => book.delete_order(order_id, &mut observer),
        Commands::Execute { order_id, quantity, price } => {
            book.execute_order(order_id, quantity, price, &mut observer)
        }
        Commands::Book => {
            print_book(&book);
            return;
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
    }
    print_book(&book);
}

fn submit(
    book: &mut OrderBook,
    observer: &mut ConsoleObserver,
    order: crate::error::EngineResult<Order>,
) -> crate::error::EngineResult<()> {
    let order = order?;
    book.add_order(order, observer)
}

fn print_book(book: &OrderBook) {
    println!("------ Order Book (symbol {}) ------", book.symbol_id());
    println!(
        "{}",
        serde_json::to_string_pretty(&book.dump_levels()).unwrap_or_default()
    );
    println!("-------------------------------------");
}
