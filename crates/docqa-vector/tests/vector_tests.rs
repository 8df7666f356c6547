use std::sync::Arc;

use docqa_core::chunker::chunk_documents;
use docqa_core::traits::Retriever;
use docqa_core::types::Document;
use docqa_core::Error;
use docqa_embed::HashEmbedder;
use docqa_vector::FlatIndex;

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "\n--- Page 1 ---\nThe boiler must be serviced every autumn by a certified technician.\n--- Page 2 ---\nBleed the radiators when the heating makes gurgling noises.",
            "heating.txt",
        ),
        Document::new(
            "\n--- Page 1 ---\nSourdough needs a lively starter and a long cold proof.\n--- Page 2 ---\nBake the loaf in a preheated dutch oven.",
            "baking.txt",
        ),
    ]
}

#[test]
fn chunks_from_the_chunker_are_searchable() {
    let chunks = chunk_documents(&corpus(), 80, 10).unwrap();
    let index = FlatIndex::new(Arc::new(HashEmbedder::new(256)), 4);
    index.index(&chunks).unwrap();
    assert_eq!(index.len(), chunks.len());

    let hits = index.search("bleed the radiators gurgling", 3).unwrap();
    assert_eq!(hits[0].chunk.source, "heating.txt");
    assert_eq!(hits[0].chunk.page, 2);
    assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
}

#[test]
fn identical_query_is_at_distance_zero() {
    let chunks = chunk_documents(&corpus(), 1000, 100).unwrap();
    let index = FlatIndex::new(Arc::new(HashEmbedder::new(128)), 8);
    index.index(&chunks).unwrap();
    let hits = index.search(&chunks[1].text, 1).unwrap();
    assert_eq!(hits[0].key(), chunks[1].key());
    assert!(hits[0].score < 1e-5);
}

#[test]
fn not_ready_until_first_index() {
    let index = FlatIndex::new(Arc::new(HashEmbedder::new(16)), 4);
    let err = index.search("anything", 2).unwrap_err();
    assert!(Error::is_not_ready(&err));
}

#[test]
fn concurrent_readers_see_a_complete_index() {
    let chunks = chunk_documents(&corpus(), 60, 10).unwrap();
    let index = Arc::new(FlatIndex::new(Arc::new(HashEmbedder::new(64)), 2));
    index.index(&chunks).unwrap();
    let expected = chunks.len();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let index = index.clone();
            let chunks = chunks.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    if i == 0 {
                        index.index(&chunks).unwrap();
                    } else {
                        let hits = index.search("sourdough starter", expected).unwrap();
                        assert_eq!(hits.len(), expected);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}
