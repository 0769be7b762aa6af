//! Plain-text and JSON rendering for command results.
//!
//! Every function writes to a caller-supplied [`Write`] so handlers can be
//! tested against a buffer. Amounts are rounded half-up to cents here and
//! nowhere earlier.

use std::io::{self, Write};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Serialize;
use tax_core::calculations::common::round_half_up;
use tax_core::{
    Declaration, DeclarationResult, DeductionClass, Document, PaymentMethod, Source, TaxPolicy,
    Taxpayer, Transaction, TransactionSummary,
};

const LABEL_WIDTH: usize = 34;
const AMOUNT_WIDTH: usize = 16;

/// `1234.5` as `1234.50`.
pub fn money(value: Decimal) -> String {
    format!("{:.2}", round_half_up(value))
}

/// `0.15` as `15%`.
pub fn percent(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}

fn line<W: Write>(
    out: &mut W,
    label: &str,
    value: &str,
) -> io::Result<()> {
    writeln!(
        out,
        "{:<label$}{:>amount$}",
        label,
        value,
        label = LABEL_WIDTH,
        amount = AMOUNT_WIDTH
    )
}

fn amount_line<W: Write>(
    out: &mut W,
    label: &str,
    value: Decimal,
) -> io::Result<()> {
    line(out, label, &money(value))
}

fn header<W: Write>(
    out: &mut W,
    title: &str,
) -> io::Result<()> {
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "=".repeat(title.len()))
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(
    out: &mut W,
    value: &T,
) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Itemized declaration: income, exemption, expenses, special deductions,
/// bracket slices and the final balance.
pub fn write_declaration<W: Write>(
    out: &mut W,
    taxpayer: &Taxpayer,
    result: &DeclarationResult,
) -> io::Result<()> {
    header(
        out,
        &format!("Declaration {} for {}", result.tax_year, taxpayer.full_name),
    )?;
    line(out, "Expense method", result.expense_method.as_str())?;
    writeln!(out)?;

    amount_line(out, "Total income (gross)", result.total_income)?;
    for source in &result.income_by_source {
        let label = if source.source_id == 0 {
            "  unassigned".to_string()
        } else {
            format!("  source #{}", source.source_id)
        };
        amount_line(out, &label, source.gross)?;
    }
    amount_line(out, "Withholding already paid", result.total_withholding)?;

    if result.exemption_forfeited {
        line(out, "Exemption", "forfeited")?;
    } else {
        amount_line(out, "Exemption", result.exemption_applied)?;
    }
    amount_line(out, "Income after exemption", result.taxable_after_exemption)?;
    writeln!(out)?;

    if let Some(ratio) = result.expense_ratio {
        amount_line(out, "General expenses", result.total_general_expenses)?;
        line(out, "  taxable share", &ratio.normalize().to_string())?;
    }
    amount_line(out, "Deductible expense", result.deductible_expense)?;
    amount_line(out, "Net yield", result.safi_irat)?;
    writeln!(out)?;

    amount_line(out, "Special deductions claimed", result.total_special_deductions)?;
    amount_line(out, "  cap (10% of net yield)", result.special_deduction_cap)?;
    amount_line(out, "Special deductions allowed", result.allowed_special_deduction)?;
    writeln!(out)?;

    amount_line(out, "Tax base", result.tax_base)?;
    for slice in &result.bracket_breakdown {
        let label = format!("  {} of {}", percent(slice.rate), money(slice.base));
        amount_line(out, &label, slice.tax)?;
    }
    amount_line(out, "Calculated tax", result.calculated_tax)?;
    amount_line(out, "Less withholding", result.total_withholding)?;

    if result.is_refund() {
        amount_line(out, "Refund due", -result.net_tax_to_pay)?;
    } else {
        amount_line(out, "Net tax to pay", result.net_tax_to_pay)?;
    }

    writeln!(out)?;
    if result.declaration_required {
        writeln!(
            out,
            "A declaration is required (income above {}).",
            money(result.declaration_limit)
        )
    } else {
        writeln!(
            out,
            "No declaration required (income does not exceed {}).",
            money(result.declaration_limit)
        )
    }
}

pub fn write_policy<W: Write>(
    out: &mut W,
    policy: &TaxPolicy,
) -> io::Result<()> {
    header(out, &format!("Tax policy {}", policy.tax_year))?;
    amount_line(out, "Exemption", policy.exemption_amount)?;
    if policy.exemption_forfeiture_threshold.is_zero() {
        line(out, "Exemption forfeited above", "never")?;
    } else {
        amount_line(
            out,
            "Exemption forfeited above",
            policy.exemption_forfeiture_threshold,
        )?;
    }
    amount_line(out, "Declaration limit", policy.declaration_limit)?;
    line(out, "Lump-sum expense rate", &percent(policy.lump_sum_rate))?;
    line(out, "Withholding rate", &percent(policy.withholding_rate))?;
    writeln!(out)?;
    writeln!(out, "Brackets")?;
    for bracket in policy.brackets.brackets() {
        let limit = match bracket.upper_limit {
            Some(limit) => format!("up to {}", money(limit)),
            None => "above".to_string(),
        };
        line(out, &format!("  {}", limit), &percent(bracket.rate))?;
    }
    Ok(())
}

pub fn write_taxpayers<W: Write>(
    out: &mut W,
    taxpayers: &[Taxpayer],
) -> io::Result<()> {
    if taxpayers.is_empty() {
        return writeln!(out, "No taxpayers.");
    }
    for taxpayer in taxpayers {
        writeln!(out, "{:>4}  {}", taxpayer.id, taxpayer.full_name)?;
    }
    Ok(())
}

pub fn write_payment_methods<W: Write>(
    out: &mut W,
    methods: &[PaymentMethod],
) -> io::Result<()> {
    for method in methods {
        writeln!(out, "{:>4}  {}", method.id, method.method_name)?;
    }
    Ok(())
}

pub fn write_sources<W: Write>(
    out: &mut W,
    sources: &[Source],
) -> io::Result<()> {
    if sources.is_empty() {
        return writeln!(out, "No sources.");
    }
    for source in sources {
        let mut flags = Vec::new();
        if source.is_net {
            flags.push("net");
        }
        if source.deduction_class == DeductionClass::Special {
            flags.push("special");
        }
        writeln!(
            out,
            "{:>4}  {:<24} {:<8} taxpayer #{:<4} {}",
            source.id,
            source.name,
            source.kind.as_str(),
            source.taxpayer_id,
            flags.join(",")
        )?;
    }
    Ok(())
}

pub fn write_transactions<W: Write>(
    out: &mut W,
    transactions: &[Transaction],
) -> io::Result<()> {
    if transactions.is_empty() {
        return writeln!(out, "No transactions.");
    }
    for t in transactions {
        writeln!(
            out,
            "{:>5}  {}  {:<8} {:<20} {:>14} {:<7} {}",
            t.id,
            t.transaction_date,
            t.transaction_type.as_str(),
            t.source_name.as_deref().unwrap_or("-"),
            money(t.amount),
            if t.is_taxable { "taxable" } else { "" },
            t.description.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

fn field<W: Write>(
    out: &mut W,
    label: &str,
    value: &str,
) -> io::Result<()> {
    writeln!(out, "{:<width$}{}", label, value, width = LABEL_WIDTH)
}

/// Every stored field of one transaction, joined names included.
pub fn write_transaction<W: Write>(
    out: &mut W,
    t: &Transaction,
) -> io::Result<()> {
    header(out, &format!("Transaction #{}", t.id))?;
    field(out, "Taxpayer", &format!("#{}", t.taxpayer_id))?;
    field(out, "Date", &t.transaction_date.to_string())?;
    field(out, "Type", t.transaction_type.as_str())?;
    field(out, "Source", t.source_name.as_deref().unwrap_or("-"))?;
    field(out, "Payment method", t.payment_method_name.as_deref().unwrap_or("-"))?;
    field(out, "Amount", &money(t.amount))?;
    field(out, "Taxable", if t.is_taxable { "yes" } else { "no" })?;
    field(out, "Tax item code", t.tax_item_code.as_deref().unwrap_or("-"))?;
    field(out, "Description", t.description.as_deref().unwrap_or("-"))?;
    let document = match (t.document_id, &t.document_name) {
        (Some(id), Some(name)) => format!("#{} {}", id, name),
        (Some(id), None) => format!("#{}", id),
        (None, _) => "-".to_string(),
    };
    field(out, "Document", &document)
}

/// One line per document with its resolved local path.
pub fn write_documents<W: Write>(
    out: &mut W,
    documents: &[Document],
    root: &Path,
) -> io::Result<()> {
    if documents.is_empty() {
        return writeln!(out, "No documents.");
    }
    for doc in documents {
        writeln!(
            out,
            "{:>4}  {:<24} {:<14} {}",
            doc.id,
            doc.display_name,
            doc.doc_ref.as_deref().unwrap_or("-"),
            doc.full_local_path(root).display()
        )?;
    }
    Ok(())
}

pub fn write_summary<W: Write>(
    out: &mut W,
    summary: &TransactionSummary,
) -> io::Result<()> {
    amount_line(out, "Total income", summary.total_income)?;
    amount_line(out, "  taxable", summary.taxable_income)?;
    amount_line(out, "Total expense", summary.total_expense)?;
    amount_line(out, "Net", summary.net_income)
}

pub fn write_declarations<W: Write>(
    out: &mut W,
    declarations: &[Declaration],
) -> io::Result<()> {
    if declarations.is_empty() {
        return writeln!(out, "No saved declarations.");
    }
    for d in declarations {
        writeln!(
            out,
            "{:>4}  {}  {:<24} {:<9} {:<9} base {:>14}  tax {:>12}  net {:>12}",
            d.id,
            d.created_at.format("%Y-%m-%d %H:%M"),
            d.name,
            d.expense_method.as_str(),
            d.status.as_str(),
            money(d.tax_base),
            money(d.calculated_tax),
            money(d.net_tax_to_pay)
        )?;
    }
    Ok(())
}
