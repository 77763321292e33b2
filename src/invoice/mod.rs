pub mod pdf;
pub mod sink;

use uuid::Uuid;

use crate::models::{Order, OrderItem};
use pdf::{Align, Document, TextLine};

pub fn file_name(order_id: Uuid) -> String {
    format!("invoice-{order_id}.pdf")
}

/// Grand total recomputed from the frozen line items; matches the order's
/// stored total to the cent.
pub fn grand_total(items: &[OrderItem]) -> f64 {
    items
        .iter()
        .map(|item| item.price * f64::from(item.quantity))
        .sum()
}

pub fn build_document(order: &Order, items: &[OrderItem]) -> Document {
    let mut doc = Document::new();
    doc.push(TextLine::new("Invoice", 32.0, Align::Center));
    doc.push(TextLine::new(
        "----------------------------------------",
        32.0,
        Align::Center,
    ));
    doc.push(TextLine::new(
        format!("Order Number: {}", order.id),
        16.0,
        Align::Center,
    ));
    doc.push(TextLine::blank());
    doc.push(TextLine::blank());
    for item in items {
        let line_total = item.price * f64::from(item.quantity);
        doc.push(TextLine::new(
            format!(
                "{} - {} X ${:.2} = ${:.2}",
                item.title, item.quantity, item.price, line_total
            ),
            14.0,
            Align::Left,
        ));
        doc.push(TextLine::blank());
    }
    doc.push(TextLine::blank());
    doc.push(TextLine::blank());
    doc.push(TextLine::new(
        format!("Total Price: ${:.2}", grand_total(items)),
        22.0,
        Align::Right,
    ));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order_with(items: &[(&str, f64, i32)]) -> (Order, Vec<OrderItem>) {
        let order_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let items: Vec<OrderItem> = items
            .iter()
            .enumerate()
            .map(|(line_no, (title, price, quantity))| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: Uuid::new_v4(),
                line_no: line_no as i32,
                title: (*title).to_string(),
                description: None,
                price: *price,
                image_url: None,
                quantity: *quantity,
                created_at: Utc::now(),
            })
            .collect();
        let order = Order {
            id: order_id,
            user_id,
            user_name: "Shopper".into(),
            total: grand_total(&items),
            payment_status: "paid".into(),
            paid_at: Some(Utc::now()),
            created_at: Utc::now(),
        };
        (order, items)
    }

    #[tokio::test]
    async fn worked_example_renders_line_items_and_footer() {
        let (order, items) = order_with(&[("ProductA", 10.0, 2), ("ProductB", 5.5, 1)]);
        let doc = build_document(&order, &items);

        let buffer = sink::test_support::SharedBuffer::default();
        let mut out = sink::FanoutWriter::new();
        out.push(Box::new(sink::test_support::BufferSink {
            buffer: buffer.clone(),
        }));
        doc.write_to(&mut out).await.unwrap();
        let rendered = String::from_utf8(buffer.contents()).unwrap();

        assert!(rendered.contains(&format!("Order Number: {}", order.id)));
        assert!(rendered.contains("ProductA - 2 X $10.00 = $20.00"));
        assert!(rendered.contains("ProductB - 1 X $5.50 = $5.50"));
        assert!(rendered.contains("Total Price: $25.50"));
    }

    #[test]
    fn grand_total_sums_quantity_times_unit_price() {
        let (order, items) = order_with(&[("A", 10.0, 2), ("B", 5.5, 1)]);
        assert_eq!(grand_total(&items), 25.5);
        assert_eq!(grand_total(&items), order.total);
        assert_eq!(grand_total(&[]), 0.0);
    }

    #[test]
    fn invoice_file_name_carries_the_order_id() {
        let id = Uuid::new_v4();
        assert_eq!(file_name(id), format!("invoice-{id}.pdf"));
    }
}
