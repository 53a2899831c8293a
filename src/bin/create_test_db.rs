use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rust_decimal_macros::dec;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use hodyviku::{
    ContributionBatch, ContributionItem, FundType, Ledger, LedgerConfig, LoanStatus, MemberStatus,
    NewFund, NewLoan, NewMember, NewPenalty, NewTransaction, PenaltyStatus, Repayment,
    TransactionType, initialize_db,
};

/// A utility for creating a demo database for the HODYVIKU ledger server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let mut conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    let today = OffsetDateTime::now_utc().date();
    let mut ledger = Ledger::new(&mut conn, LedgerConfig::default(), today);

    println!("Creating members...");
    let mut members = Vec::new();
    for (name, email) in [
        ("Amina Fon", Some("amina@example.com")),
        ("Bello Ndzi", None),
        ("Clarisse Ewane", Some("clarisse@example.com")),
    ] {
        let member = ledger.create_member(&NewMember {
            name: name.to_owned(),
            email: email.map(str::to_owned),
            phone: None,
            join_date: Some(today - Duration::days(180)),
            status: MemberStatus::Active,
        })?;

        ledger.create_transaction(&NewTransaction {
            transaction_type: TransactionType::Deposit,
            amount: dec!(500),
            date: Some(today - Duration::days(120)),
            description: "Opening balance".to_owned(),
            member_id: member.id,
            recipient_id: None,
            fund_id: None,
        })?;

        members.push(member);
    }

    println!("Creating funds...");
    let savings = ledger.create_fund(&NewFund {
        name: "Savings".to_owned(),
        fund_type: FundType::Savings,
        description: "Monthly savings".to_owned(),
        total_amount: dec!(0),
        interest_rate: dec!(0),
    })?;
    let investment = ledger.create_fund(&NewFund {
        name: "Investment".to_owned(),
        fund_type: FundType::Investment,
        description: "Lending pool".to_owned(),
        total_amount: dec!(0),
        interest_rate: dec!(10),
    })?;

    println!("Recording contributions...");
    for (months_ago, member) in (1..=3).rev().zip(members.iter().cycle()) {
        ledger.create_contributions(&ContributionBatch {
            member_id: member.id,
            date: Some(today - Duration::days(30 * months_ago)),
            description: "Monthly contribution".to_owned(),
            contributions: vec![
                ContributionItem {
                    fund_id: savings.id,
                    amount: dec!(50),
                },
                ContributionItem {
                    fund_id: investment.id,
                    amount: dec!(100),
                },
            ],
        })?;
    }

    println!("Issuing a loan...");
    let loan = ledger.create_loan(&NewLoan {
        member_id: members[1].id,
        fund_id: investment.id,
        amount: dec!(200),
        interest_rate: investment.interest_rate,
        start_date: Some(today - Duration::days(60)),
        due_date: today + Duration::days(120),
        status: LoanStatus::Active,
        purpose: "School fees".to_owned(),
    })?;
    ledger.repay_loan(
        loan.id,
        &Repayment {
            amount: dec!(50),
            date: None,
            description: "First instalment".to_owned(),
        },
    )?;

    println!("Levying a penalty...");
    let penalty = ledger.create_penalty(&NewPenalty {
        member_id: members[2].id,
        amount: dec!(10),
        reason: "Late to meeting".to_owned(),
        date: None,
        status: PenaltyStatus::Pending,
    })?;
    ledger.set_penalty_status(penalty.id, PenaltyStatus::Paid)?;

    ledger.create_transaction(&NewTransaction {
        transaction_type: TransactionType::Transfer,
        amount: dec!(25),
        date: None,
        description: "Market money".to_owned(),
        member_id: members[0].id,
        recipient_id: Some(members[2].id),
        fund_id: None,
    })?;

    println!("Success!");

    Ok(())
}
